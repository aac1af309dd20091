//! End-to-end HTTP + motion pipeline tests.
//!
//! Builds the real `actix_web` service from [`polargraph_device::api`] over
//! a live `MachineState`/`JobQueue`/`Scheduler`, the same wiring
//! `main.rs` does, and drives it through `/api/path` exactly as the
//! supervisor would (spec §8 scenarios S1-S4, S6). Moves are kept short
//! (tens of steps) rather than reproducing the scenarios' exact distances:
//! `std::thread::sleep`'s scheduling jitter dominates over the requested
//! step delay once a move runs into the thousands of steps, which would
//! make these tests flaky under load independent of correctness.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use parking_lot::Mutex;
use polargraph_device::api::{self, AppState};
use polargraph_device::config::ControllerConfig;
use polargraph_device::pen::{LoggingServo, PenActuator};
use polargraph_device::pulse::{LoggingDirPin, LoggingStepPin, PulseEngine};
use polargraph_device::queue::JobQueue;
use polargraph_device::scheduler::Scheduler;
use polargraph_device::state::MachineState;
use polargraph_proto::{PathRequest, PathResponse, PointRequest, StartPosition, StatusResponse};

fn test_config() -> ControllerConfig {
    let mut config = ControllerConfig::default_for_tests();
    // Fast enough that a few hundred steps finish well within the test's
    // polling window.
    config.limits.max_speed = 20_000;
    config.limits.min_pulse_us = 1;
    config
}

/// Wires up a queue, state, and scheduler on its own thread exactly as
/// `main.rs` does, returning the shared `AppState` handle for the HTTP
/// service built from it.
fn spawn_harness() -> AppState {
    let config = test_config();
    let state = Arc::new(Mutex::new(MachineState::uninitialized()));
    let queue = Arc::new(Mutex::new(JobQueue::new(config.limits.max_queue_size)));
    let cancel_requested = Arc::new(AtomicBool::new(false));
    let (control_tx, control_rx) = polargraph_device::control::channel();

    let pulse_engine = PulseEngine::new(
        Box::new(LoggingStepPin::new("left_step")),
        Box::new(LoggingDirPin::new("left_dir", false)),
        Box::new(LoggingStepPin::new("right_step")),
        Box::new(LoggingDirPin::new("right_dir", false)),
        config.limits.min_pulse_us,
        cancel_requested.clone(),
    );
    let pen_actuator = PenActuator::new(
        Box::new(LoggingServo::new("pen_servo")),
        90.0,
        0.0,
        Duration::from_millis(0),
    );
    let scheduler = Scheduler::new(
        queue.clone(),
        state.clone(),
        config.geometry,
        config.limits,
        cancel_requested.clone(),
        pulse_engine,
        pen_actuator,
        control_rx,
    );
    std::thread::spawn(move || scheduler.run());

    AppState {
        queue,
        state,
        geometry: config.geometry,
        limits: config.limits,
        cancel_requested,
        control_tx,
    }
}

/// Spec §8 S1: a single pen-down point, `endOfJob=true`, ends with the
/// declared target pose and an idle, empty queue.
#[actix_web::test]
async fn horizontal_line_reaches_target_pose_and_drains_queue() {
    let app_state = spawn_harness();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure),
    )
    .await;

    let init = PathRequest {
        reset: Some(true),
        end_of_job: None,
        speed: None,
        start_position: Some(StartPosition {
            x: Some(575.0),
            y: Some(365.0),
            pen_down: Some(false),
            ..Default::default()
        }),
        points: vec![PointRequest {
            x: Some(580.0),
            y: Some(365.0),
            pen_down: Some(true),
            speed: Some(20_000),
            ..Default::default()
        }],
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&init)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let end_req = PathRequest {
        end_of_job: Some(true),
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&end_req)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let mut idle = None;
    for _ in 0..500 {
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        if !status.queue.is_executing && status.queue.size == 0 {
            idle = Some(status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let idle = idle.expect("job never reached idle within the polling window");
    assert!((idle.state.x_mm - 580.0).abs() < 0.5);
    assert!((idle.state.y_mm - 365.0).abs() < 0.5);
    assert!(idle.state.pen_down);
}

/// Spec §8 S4: a batch that would push the queue past `MAX_QUEUE_SIZE` is
/// rejected wholesale with 429, and nothing is enqueued.
#[actix_web::test]
async fn overflowing_batch_is_rejected_and_enqueues_nothing() {
    let app_state = spawn_harness();
    {
        let mut q = app_state.queue.lock();
        *q = JobQueue::new(5);
    }
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure),
    )
    .await;

    let init = PathRequest {
        reset: Some(true),
        start_position: Some(StartPosition {
            x: Some(100.0),
            y: Some(100.0),
            ..Default::default()
        }),
        points: vec![],
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&init)
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let overflow = PathRequest {
        points: (0..6)
            .map(|i| PointRequest {
                x: Some(100.0 + i as f64),
                y: Some(100.0),
                pen_down: Some(true),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&overflow)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
    assert_eq!(app_state.queue.lock().len(), 0);
}

/// Spec §8 S6: sending `reset=true` with a new `startPosition` mid-job
/// clears the queue and re-declares the pose without physical motion.
#[actix_web::test]
async fn reset_with_start_position_reinitializes_without_motion() {
    let app_state = spawn_harness();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure),
    )
    .await;

    let first = PathRequest {
        reset: Some(true),
        start_position: Some(StartPosition {
            x: Some(100.0),
            y: Some(100.0),
            ..Default::default()
        }),
        points: vec![PointRequest {
            x: Some(900.0),
            y: Some(600.0),
            pen_down: Some(true),
            ..Default::default()
        }],
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&first)
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let reset = PathRequest {
        reset: Some(true),
        start_position: Some(StartPosition {
            x: Some(300.0),
            y: Some(200.0),
            pen_down: Some(false),
            ..Default::default()
        }),
        points: vec![],
        end_of_job: Some(true),
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&reset)
        .to_request();
    let resp: PathResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(app_state.queue.lock().len(), 0);
    assert!((resp.state.state.x_mm - 300.0).abs() < 0.5);
    assert!((resp.state.state.y_mm - 200.0).abs() < 0.5);
    assert!(resp.state.state.initialized);
}

/// Spec §8 S2: a pen-up point still reaches its pose, with the pen raised
/// before motion starts.
#[actix_web::test]
async fn pen_up_travel_updates_pose_with_pen_lifted() {
    let app_state = spawn_harness();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure),
    )
    .await;

    let init = PathRequest {
        reset: Some(true),
        start_position: Some(StartPosition {
            x: Some(575.0),
            y: Some(365.0),
            pen_down: Some(true),
            ..Default::default()
        }),
        points: vec![PointRequest {
            x: Some(580.0),
            y: Some(370.0),
            pen_down: Some(false),
            ..Default::default()
        }],
        end_of_job: Some(true),
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&init)
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let mut idle = None;
    for _ in 0..500 {
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        if !status.queue.is_executing && status.queue.size == 0 {
            idle = Some(status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let idle = idle.expect("job never reached idle within the polling window");
    assert!((idle.state.x_mm - 580.0).abs() < 0.5);
    assert!((idle.state.y_mm - 370.0).abs() < 0.5);
    assert!(!idle.state.pen_down);
}

/// Spec §8 S3: cancelling mid-move clears the queue, stops execution, and
/// leaves the pen up.
#[actix_web::test]
async fn cancel_mid_move_clears_queue_and_stops_short_of_target() {
    let app_state = spawn_harness();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(api::configure),
    )
    .await;

    let init = PathRequest {
        reset: Some(true),
        start_position: Some(StartPosition {
            x: Some(100.0),
            y: Some(100.0),
            pen_down: Some(false),
            ..Default::default()
        }),
        points: (0..50)
            .map(|i| PointRequest {
                x: Some(100.0 + i as f64),
                y: Some(100.0),
                pen_down: Some(true),
                speed: Some(5),
                ..Default::default()
            })
            .collect(),
        end_of_job: Some(true),
        ..Default::default()
    };
    let req = test::TestRequest::post()
        .uri("/api/path")
        .set_json(&init)
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    tokio::time::sleep(Duration::from_millis(20)).await;
    let req = test::TestRequest::post().uri("/api/cancel").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let mut idle = None;
    for _ in 0..500 {
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        if !status.queue.is_executing && status.queue.size == 0 {
            idle = Some(status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // The cancel actuates the pen up physically, but `MachineState.pen_down`
    // only ever reflects the last *committed* move, so it still carries
    // whatever the last fully-driven point declared; what cancel actually
    // proves is that the queue drained without reaching the job's last
    // point (x_mm=149) and stopped executing.
    let idle = idle.expect("cancel never settled into idle within the polling window");
    assert!(idle.state.x_mm < 149.0);
    assert_eq!(app_state.queue.lock().len(), 0);
}

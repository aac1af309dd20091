//! # API Server
//!
//! Exposes the device's REST surface (spec §4.5, §6.1): status heartbeat,
//! single-motor jog, pen actuation, path submission, cancel, and park. All
//! bodies are JSON; mutating endpoints are POST; preflight `OPTIONS` returns
//! 204 with permissive CORS headers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender as StdSender;
use std::sync::Arc;

use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use parking_lot::Mutex;
use polargraph_kinematics::{checked_step_delta, inverse_kinematics, BoardGeometry, Lengths, Position};
use polargraph_proto::{
    ErrorResponse, LengthsMm, MotorId, MotorStatus, MoveRequest, PathRequest, PathResponse,
    PenRequest, QueueSnapshot, StartPosition, StateSnapshot, StatusResponse, Steps, WifiInfo,
};
use tracing::{info, warn};

use crate::config::{ControllerConfig, MotionLimits};
use crate::control::{ControlCommand, ControlRequest, JogMotor};
use crate::pulse::clamp_speed;
use crate::queue::{JobQueue, QueuedPoint, Target};
use crate::state::MachineState;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<Mutex<JobQueue>>,
    pub state: Arc<Mutex<MachineState>>,
    pub geometry: BoardGeometry,
    pub limits: MotionLimits,
    pub cancel_requested: Arc<AtomicBool>,
    pub control_tx: StdSender<ControlRequest>,
}

fn status_snapshot(state: &MachineState, queue: &JobQueue) -> StatusResponse {
    let busy = queue.is_executing();
    StatusResponse {
        wifi: WifiInfo::default(),
        motors: vec![
            MotorStatus {
                id: MotorId::Left,
                busy,
            },
            MotorStatus {
                id: MotorId::Right,
                busy,
            },
        ],
        state: StateSnapshot {
            initialized: state.initialized,
            x_mm: state.x_mm,
            y_mm: state.y_mm,
            pen_down: state.pen_down,
            lengths_mm: LengthsMm {
                left: state.left_len_mm,
                right: state.right_len_mm,
            },
            steps: Steps {
                left: state.left_steps,
                right: state.right_steps,
            },
        },
        queue: QueueSnapshot {
            size: queue.len(),
            is_executing: queue.is_executing(),
        },
    }
}

/// Blocks on the reply leg of the scheduler control channel. `/api/move` and
/// `/api/pen` are diagnostic/actuator commands the scheduler thread must
/// serialize against its own pulse engine and pen actuator (spec §9 open
/// question 3), so the HTTP task hands the request across and waits.
async fn send_control(
    control_tx: StdSender<ControlRequest>,
    command: ControlCommand,
) -> Result<(), crate::control::ControlError> {
    web::block(move || {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        let _ = control_tx.send(ControlRequest {
            command,
            reply: reply_tx,
        });
        reply_rx
            .recv()
            .unwrap_or(Err(crate::control::ControlError::Busy))
    })
    .await
    .unwrap_or(Err(crate::control::ControlError::Busy))
}

#[get("/api/ping")]
async fn ping() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

#[get("/api/status")]
async fn status(data: web::Data<AppState>) -> impl Responder {
    let state = data.state.lock();
    let queue = data.queue.lock();
    HttpResponse::Ok().json(status_snapshot(&state, &queue))
}

#[post("/api/move")]
async fn move_motor(body: web::Json<MoveRequest>, data: web::Data<AppState>) -> impl Responder {
    let req = body.into_inner();

    let steps = match checked_step_delta(req.steps) {
        Ok(s) => s,
        Err(err) => return HttpResponse::UnprocessableEntity().json(ErrorResponse::new(err.to_string())),
    };
    let speed = clamp_speed(req.speed.unwrap_or(0), data.limits.max_speed, data.limits.travel_speed);
    let motor = match req.motor.as_str() {
        "left" => JogMotor::Left,
        "right" => JogMotor::Right,
        other => {
            return HttpResponse::NotFound()
                .json(ErrorResponse::new(format!("unknown motor: {other}")))
        }
    };

    match send_control(data.control_tx.clone(), ControlCommand::Jog { motor, steps, speed }).await {
        Ok(()) => {
            let state = data.state.lock();
            let queue = data.queue.lock();
            HttpResponse::Ok().json(status_snapshot(&state, &queue))
        }
        Err(err) => HttpResponse::Conflict().json(ErrorResponse::new(err.to_string())),
    }
}

#[post("/api/pen")]
async fn pen(body: web::Json<PenRequest>, data: web::Data<AppState>) -> impl Responder {
    let req = body.into_inner();
    match send_control(data.control_tx.clone(), ControlCommand::Pen { pen_down: req.pen_down }).await {
        Ok(()) => {
            let state = data.state.lock();
            let queue = data.queue.lock();
            HttpResponse::Ok().json(status_snapshot(&state, &queue))
        }
        Err(err) => HttpResponse::Conflict().json(ErrorResponse::new(err.to_string())),
    }
}

/// Resolves a `startPosition` body into lengths, accepting whichever of the
/// three equivalent forms was supplied (spec §6.1).
fn resolve_start_position(
    geometry: &BoardGeometry,
    start: &StartPosition,
) -> Result<(Lengths, bool), String> {
    let pen_down = start.pen_down.unwrap_or(false);
    if let (Some(l1), Some(l2)) = (start.l1, start.l2) {
        return Ok((Lengths { left_mm: l1, right_mm: l2 }, pen_down));
    }
    if let (Some(left), Some(right)) = (start.left_length_mm, start.right_length_mm) {
        return Ok((Lengths { left_mm: left, right_mm: right }, pen_down));
    }
    if let (Some(x), Some(y)) = (start.x, start.y) {
        let lengths = inverse_kinematics(geometry, Position { x, y })
            .map_err(|e| e.to_string())?;
        return Ok((lengths, pen_down));
    }
    Err("startPosition must supply (l1,l2), (leftLengthMm,rightLengthMm), or (x,y)".to_string())
}

#[post("/api/path")]
async fn path(body: web::Json<PathRequest>, data: web::Data<AppState>) -> impl Responder {
    let req = body.into_inner();

    if req.reset.unwrap_or(false) {
        let mut q = data.queue.lock();
        q.clear();
    }

    let needs_init = req.reset.unwrap_or(false) || !data.state.lock().initialized;
    if needs_init {
        let Some(start) = req.start_position.as_ref() else {
            return HttpResponse::BadRequest()
                .json(ErrorResponse::new("startPosition is required on reset or before the first path"));
        };
        match resolve_start_position(&data.geometry, start) {
            Ok((lengths, pen_down)) => {
                let mut s = data.state.lock();
                s.set_from_lengths(&data.geometry, lengths, pen_down);
            }
            Err(msg) => return HttpResponse::UnprocessableEntity().json(ErrorResponse::new(msg)),
        }
    }

    let default_speed = req.speed.unwrap_or(0);
    let queued: Vec<QueuedPoint> = req
        .points
        .iter()
        .filter_map(|p| {
            let target = if let (Some(l1), Some(l2)) = (p.l1, p.l2) {
                Some(Target::Lengths { l1, l2 })
            } else if let (Some(x), Some(y)) = (p.x, p.y) {
                Some(Target::Position { x, y })
            } else {
                None
            };
            target.map(|target| QueuedPoint {
                target,
                pen_down: p.pen_down.unwrap_or(true),
                speed: p.speed.unwrap_or(default_speed),
            })
        })
        .collect();

    let accepted = {
        let mut q = data.queue.lock();
        match q.enqueue_many(queued) {
            Ok(accepted) => accepted,
            Err(err) => return HttpResponse::TooManyRequests().json(ErrorResponse::new(err.to_string())),
        }
    };

    let mut q = data.queue.lock();
    if req.end_of_job.unwrap_or(false) {
        q.set_end_of_job(true);
    }
    if !q.is_empty() && !q.is_executing() {
        q.set_executing(true);
    }
    let queue_size = q.len();
    drop(q);

    let state = data.state.lock();
    let queue = data.queue.lock();
    info!(accepted, queue_size, "path batch accepted");
    HttpResponse::Ok().json(PathResponse {
        accepted,
        queue_size,
        state: status_snapshot(&state, &queue),
    })
}

#[post("/api/cancel")]
async fn cancel(data: web::Data<AppState>) -> impl Responder {
    data.cancel_requested.store(true, Ordering::SeqCst);
    warn!("cancel requested via API");
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// A fixed travel destination the gondola can always reach without
/// crossing the drawable margin: the board's top-left corner, inset by the
/// pen offset so the pen tip itself never leaves the board.
#[post("/api/park")]
async fn park(data: web::Data<AppState>) -> impl Responder {
    let target_x = data.geometry.pen_offset_mm;
    let target_y = 0.0;

    let mut q = data.queue.lock();
    match q.enqueue_many(vec![QueuedPoint {
        target: Target::Position { x: target_x, y: target_y },
        pen_down: false,
        speed: data.limits.travel_speed,
    }]) {
        Ok(_) => {
            q.set_end_of_job(true);
            if !q.is_executing() {
                q.set_executing(true);
            }
            HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
        }
        Err(err) => HttpResponse::TooManyRequests().json(ErrorResponse::new(err.to_string())),
    }
}

/// Registers every handler onto a service config. Shared between the real
/// `HttpServer` factory and `actix_web::test`-driven integration tests, so
/// the routes under test are exactly the routes that serve traffic.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ping)
        .service(status)
        .service(move_motor)
        .service(pen)
        .service(path)
        .service(cancel)
        .service(park)
        .default_service(web::route().to(|req: actix_web::HttpRequest| async move {
            if req.method() == Method::OPTIONS {
                HttpResponse::NoContent().finish()
            } else {
                HttpResponse::MethodNotAllowed().json(ErrorResponse::new("method not allowed"))
            }
        }));
}

/// Starts the Actix web server (spec §4.5 "Concurrency isolation": runs on
/// the async side while the motion scheduler owns its own thread).
pub fn start_api_server(config: &ControllerConfig, app_state: AppState) -> std::io::Result<actix_web::dev::Server> {
    let bind_addr = config.http.bind_addr.clone();
    let port = config.http.port;
    let server = HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET,POST,OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Content-Type")),
            )
            .app_data(web::Data::new(app_state.clone()))
            .configure(configure)
    })
    .bind((bind_addr.as_str(), port))?
    .run();
    Ok(server)
}

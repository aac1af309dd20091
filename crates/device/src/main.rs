//! # Polargraph Device Controller
//!
//! Entry point for the on-device motion controller: loads `controller.cfg`,
//! wires up the job queue, machine state, pulse engine, and pen actuator,
//! spawns the motion scheduler on its own OS thread, and serves the HTTP
//! surface on the async runtime (spec §2 "Components", §5 "Concurrency &
//! resource model").

// Use mimalloc for better performance, matching the host binary this one
// was grown from.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use tracing::info;

use polargraph_device::api::{self, AppState};
use polargraph_device::config::ControllerConfig;
use polargraph_device::pen::{LoggingServo, PenActuator};
use polargraph_device::pulse::{LoggingDirPin, LoggingStepPin, PulseEngine};
use polargraph_device::queue::JobQueue;
use polargraph_device::scheduler::Scheduler;
use polargraph_device::state::MachineState;
use polargraph_device::control;

/// Pen servo settle delay (spec §5 "Suspension points": "~400 ms").
const PEN_SETTLE_DELAY: Duration = Duration::from_millis(400);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the controller configuration file.
    #[arg(short, long, default_value = "controller.cfg")]
    config_path: PathBuf,

    /// Run against simulated GPIO/servo hardware instead of real silicon.
    #[arg(long)]
    mock_gpio: bool,
}

#[actix_rt::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    info!("Loading configuration from: {:?}", cli.config_path);
    let config = if cli.config_path.exists() {
        ControllerConfig::load(&cli.config_path)?
    } else {
        info!("no controller.cfg found at {:?}; using built-in defaults", cli.config_path);
        ControllerConfig::default_for_tests()
    };

    // The device boots with no declared pose; it is re-established by the
    // first `startPosition` after boot or reset (spec §6.4 "Persistence").
    let state = Arc::new(Mutex::new(MachineState::uninitialized()));
    let queue = Arc::new(Mutex::new(JobQueue::new(config.limits.max_queue_size)));
    let cancel_requested = Arc::new(AtomicBool::new(false));
    let (control_tx, control_rx) = control::channel();

    if !cli.mock_gpio {
        info!("no real GPIO backend wired into this binary yet; running simulated pins regardless of --mock-gpio");
    }

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
        PEN_SETTLE_DELAY,
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
    // Runs on a dedicated OS thread so its pulse timing is never at the
    // mercy of the async runtime's scheduler (spec §9 "Async vs
    // dedicated-thread motion").
    std::thread::spawn(move || scheduler.run());
    info!("motion scheduler thread started");

    let app_state_cancel = cancel_requested.clone();
    let app_state = AppState {
        queue,
        state,
        geometry: config.geometry,
        limits: config.limits,
        cancel_requested,
        control_tx,
    };
    let api_server = api::start_api_server(&config, app_state)?;
    info!(
        "API server started on {}:{}",
        config.http.bind_addr, config.http.port
    );

    tokio::select! {
        _ = api_server => {
            info!("API server shut down.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received; cancelling any in-flight move before exiting");
            app_state_cancel.store(true, std::sync::atomic::Ordering::SeqCst);
            // Give the scheduler thread one poll interval to observe the
            // flag, disable outputs, and lift the pen before the process
            // exits (spec SPEC_FULL.md "Graceful shutdown").
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    Ok(())
}

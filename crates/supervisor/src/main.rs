//! # Polargraph Supervisor
//!
//! Job-streaming service sitting between a designer UI and the device: it
//! batches a full point list into fixed-size chunks, submits them to the
//! device's `/api/path`, and exposes its own REST surface for job control
//! (spec §4.6, §6.2).

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use tracing::info;

mod api;
mod batch;
mod client;
mod job;
mod poller;
mod runner;

use api::AppState;
use client::DeviceClient;

/// Submitting a chunk carries a seconds-scale timeout; status polling uses
/// its own shorter one so a slow device never blocks submission (spec §5
/// "Timeouts").
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the device this supervisor streams jobs to.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    device_url: String,

    /// Port this supervisor's own API listens on.
    #[arg(short, long, default_value_t = 8090)]
    port: u16,

    /// Address this supervisor's own API binds to.
    #[arg(long, default_value = "0.0.0.0")]
    bind_addr: String,

    /// Number of points per `/api/path` submission.
    #[arg(long, default_value_t = batch::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Interval, in seconds, between device status polls.
    #[arg(long, default_value_t = 3)]
    poll_interval_secs: u64,
}

#[actix_rt::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    info!("supervisor streaming to device at {}", cli.device_url);

    let submit_client = reqwest::Client::builder().timeout(SUBMIT_TIMEOUT).build()?;
    let poll_client = reqwest::Client::builder().timeout(POLL_TIMEOUT).build()?;
    let device = DeviceClient::new(cli.device_url.clone(), submit_client, poll_client);

    let job_slot = Arc::new(Mutex::new(None));

    let poller_slot = job_slot.clone();
    let poller_device = device.clone();
    let poll_interval = if cli.poll_interval_secs == 0 {
        DEFAULT_POLL_INTERVAL
    } else {
        Duration::from_secs(cli.poll_interval_secs)
    };
    tokio::spawn(poller::run_poller(poller_slot, poller_device, poll_interval));

    let app_state = AppState {
        job: job_slot,
        device,
        next_job_id: Arc::new(AtomicU64::new(1)),
        batch_size: cli.batch_size,
    };
    let api_server = api::start_api_server(&cli.bind_addr, cli.port, app_state)?;

    tokio::select! {
        _ = api_server => {
            info!("supervisor API server shut down.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received. exiting.");
        }
    }

    Ok(())
}

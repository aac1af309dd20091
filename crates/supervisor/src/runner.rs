//! Chunk-Sender Task
//!
//! The coroutine that drives one job from `pending` to a terminal status:
//! submits batches sequentially, retries transient failures with bounded
//! exponential backoff, waits out pauses between chunks, and reacts to
//! cancellation (spec §4.6 "Job lifecycle", §5 "Supervisor side"). Grounded
//! in `klipper-host::mcu_client::run_mcu_client`'s
//! connect-retry-with-backoff loop, adapted from reconnecting a serial
//! port to retrying an HTTP POST.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use polargraph_proto::{JobPoint, JobStatus, StartPosition};
use tracing::{info, warn};

use crate::batch::build_path_request;
use crate::client::{DeviceClient, DeviceClientError};
use crate::job::JobState;

/// Bounded exponential backoff for transient chunk-submission failures
/// (spec §4.6 "Retries").
const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

pub struct JobInput {
    pub job_id: u64,
    pub batches: Vec<Vec<JobPoint>>,
    pub start_position: Option<StartPosition>,
    pub speed: Option<u32>,
}

/// Runs a job to completion (or failure/cancellation). `slot` holds the
/// single active job the API layer reads from; this task is the only
/// writer to progress counters and status while the job is active.
pub async fn run_job(slot: Arc<Mutex<Option<JobState>>>, device: DeviceClient, input: JobInput) {
    {
        let mut guard = slot.lock();
        if let Some(job) = guard.as_mut() {
            job.start();
        }
    }

    let control = {
        let guard = slot.lock();
        guard.as_ref().map(|j| j.control.clone())
    };
    let Some(control) = control else { return };

    let total_batches = input.batches.len();
    for (index, batch) in input.batches.iter().enumerate() {
        if control.cancel_requested.load(Ordering::SeqCst) {
            cancel_job(&slot, &device).await;
            return;
        }

        if control.pause_requested.load(Ordering::SeqCst) {
            info!(job_id = input.job_id, "job paused between batches");
            {
                let mut guard = slot.lock();
                if let Some(job) = guard.as_mut() {
                    job.merge_status(JobStatus::Paused, None);
                }
            }
            control.resume.notified().await;
            if control.cancel_requested.load(Ordering::SeqCst) {
                cancel_job(&slot, &device).await;
                return;
            }
            let mut guard = slot.lock();
            if let Some(job) = guard.as_mut() {
                job.merge_status(JobStatus::Running, None);
            }
        }

        let request = build_path_request(
            batch,
            index,
            total_batches,
            input.start_position.clone(),
            input.speed,
        );

        match send_with_retry(&device, &request).await {
            Ok(()) => {
                let mut guard = slot.lock();
                if let Some(job) = guard.as_mut() {
                    job.record_batch_sent(batch.len());
                }
            }
            Err(err) => {
                warn!(job_id = input.job_id, %err, "batch submission failed after retries");
                let mut guard = slot.lock();
                if let Some(job) = guard.as_mut() {
                    job.merge_status(JobStatus::Failed, Some(err.to_string()));
                }
                return;
            }
        }
    }

    info!(job_id = input.job_id, "job completed: all batches accepted");
    let mut guard = slot.lock();
    if let Some(job) = guard.as_mut() {
        job.merge_status(JobStatus::Completed, None);
    }
}

async fn send_with_retry(
    device: &DeviceClient,
    request: &polargraph_proto::PathRequest,
) -> Result<(), DeviceClientError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match device.send_path(request).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, %err, "retrying batch submission after backoff");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

async fn cancel_job(slot: &Arc<Mutex<Option<JobState>>>, device: &DeviceClient) {
    {
        let mut guard = slot.lock();
        if let Some(job) = guard.as_mut() {
            job.merge_status(JobStatus::Cancelling, None);
        }
    }
    let outcome = device.send_cancel().await;
    let mut guard = slot.lock();
    if let Some(job) = guard.as_mut() {
        match outcome {
            Ok(()) => job.merge_status(JobStatus::Cancelled, None),
            Err(err) => job.merge_status(JobStatus::Failed, Some(err.to_string())),
        }
    }
}

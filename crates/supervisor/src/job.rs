//! Job State Machine
//!
//! One supervisor-side drawing job: its batched point list, progress
//! counters, and lifecycle status. Terminal statuses are absorbing (spec §8
//! property 10, §9 "Supervisor as a state machine"): `merge_status` is the
//! single place that enforces it, mirroring how `klipper-host::state`
//! centralizes all writes to `PrinterState` behind a handful of methods
//! rather than letting callers assign the field directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use polargraph_proto::{ControllerStatusSnapshot, JobEnvelope, JobPoint, JobStatus};
use tokio::sync::Notify;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Flags the chunk-sender task polls between batches; cheap to clone, so the
/// API task and the runner task can each hold their own handle onto the same
/// underlying signal.
#[derive(Clone)]
pub struct JobControl {
    pub cancel_requested: Arc<AtomicBool>,
    pub pause_requested: Arc<AtomicBool>,
    pub resume: Arc<Notify>,
}

impl JobControl {
    pub fn new() -> Self {
        Self {
            cancel_requested: Arc::new(AtomicBool::new(false)),
            pause_requested: Arc::new(AtomicBool::new(false)),
            resume: Arc::new(Notify::new()),
        }
    }
}

/// One job's full state: progress counters, lifecycle status, and the
/// latest cached device status snapshot.
pub struct JobState {
    pub job_id: u64,
    pub status: JobStatus,
    pub points: Vec<JobPoint>,
    pub total_batches: usize,
    pub sent_points: usize,
    pub sent_batches: usize,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub error: Option<String>,
    pub controller_status: Option<ControllerStatusSnapshot>,
    pub control: JobControl,
}

impl JobState {
    pub fn new(job_id: u64, points: Vec<JobPoint>, total_batches: usize) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            points,
            total_batches,
            sent_points: 0,
            sent_batches: 0,
            started_at: None,
            finished_at: None,
            error: None,
            controller_status: None,
            control: JobControl::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(unix_now());
    }

    /// Absorbing transition: once `status` is terminal, further writes are
    /// ignored (spec §7 "Terminal-state violations", §8 property 10).
    pub fn merge_status(&mut self, status: JobStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        if status.is_terminal() {
            self.finished_at = Some(unix_now());
        }
        if error.is_some() {
            self.error = error;
        }
    }

    pub fn record_batch_sent(&mut self, batch_points: usize) {
        self.sent_points += batch_points;
        self.sent_batches += 1;
    }

    /// Attaches a freshly polled device status, stamping the freshness
    /// metadata the supervisor's own clients rely on (spec §4.6 "status
    /// polling").
    pub fn attach_controller_status(&mut self, status: polargraph_proto::StatusResponse) {
        self.controller_status = Some(ControllerStatusSnapshot {
            status,
            polled_at: unix_now(),
            stale: false,
        });
    }

    /// Marks the cached status stale once it is older than `max_age_secs`
    /// (spec §4.6 "A snapshot older than a threshold is flagged stale").
    pub fn refresh_staleness(&mut self, max_age_secs: u64) {
        if let Some(snapshot) = self.controller_status.as_mut() {
            snapshot.stale = unix_now().saturating_sub(snapshot.polled_at) > max_age_secs;
        }
    }

    pub fn to_envelope(&self) -> JobEnvelope {
        JobEnvelope {
            status: self.status,
            job_id: self.job_id,
            total_points: self.points.len(),
            sent_points: self.sent_points,
            total_batches: self.total_batches,
            sent_batches: self.sent_batches,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
            controller_status: self.controller_status.clone(),
            paused: Some(self.control.pause_requested.load(Ordering::SeqCst)),
        }
    }
}

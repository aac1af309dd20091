//! The supervisor's job envelope (spec §3 `JobState`, §6.2).

use serde::{Deserialize, Serialize};

use crate::device::StatusResponse;

/// Lifecycle status of one supervisor-side drawing job.
///
/// Terminal variants (`Cancelled`, `Completed`, `Failed`) are absorbing: see
/// `supervisor::job::JobState::merge_status`, which enforces that once a job
/// reaches one of these, further updates are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Cancelling,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed
        )
    }
}

/// A point submitted to the supervisor, prior to batching. Mirrors
/// `polargraph_proto::device::PointRequest` but is the supervisor's own
/// input shape (it does not require a pre-split batch).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPoint {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    #[serde(rename = "penDown")]
    pub pen_down: Option<bool>,
    pub speed: Option<u32>,
}

/// JSON envelope returned by `GET /api/send-path/status` and embedded in the
/// response of `POST /api/send-path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub status: JobStatus,
    #[serde(rename = "jobId")]
    pub job_id: u64,
    #[serde(rename = "totalPoints")]
    pub total_points: usize,
    #[serde(rename = "sentPoints")]
    pub sent_points: usize,
    #[serde(rename = "totalBatches")]
    pub total_batches: usize,
    #[serde(rename = "sentBatches")]
    pub sent_batches: usize,
    #[serde(rename = "startedAt")]
    pub started_at: Option<u64>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "controllerStatus", skip_serializing_if = "Option::is_none")]
    pub controller_status: Option<ControllerStatusSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

/// A cached device status snapshot plus the freshness metadata the
/// supervisor attaches to it (spec §4.6 "status polling").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatusSnapshot {
    #[serde(flatten)]
    pub status: StatusResponse,
    #[serde(rename = "polledAt")]
    pub polled_at: u64,
    pub stale: bool,
}

/// Body of `POST /api/send-path`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendPathRequest {
    pub points: Vec<JobPoint>,
    #[serde(rename = "startPosition")]
    pub start_position: Option<crate::device::StartPosition>,
    pub speed: Option<u32>,
}

/// Body of `POST /api/visualize`.
///
/// The image-to-path algorithms that normally produce `points` here (contour
/// / hatch / fill, preview rendering) are an external collaborator per the
/// controller specification's Non-goals; this service accepts an
/// already-produced point list and, when `sendToController` is set, hands it
/// straight to the same job runner `POST /api/send-path` uses.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualizeRequest {
    #[serde(rename = "sendToController")]
    pub send_to_controller: bool,
    pub points: Vec<JobPoint>,
    #[serde(rename = "startPosition")]
    pub start_position: Option<crate::device::StartPosition>,
    pub speed: Option<u32>,
}

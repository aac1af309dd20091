//! JSON bodies exchanged with the device's `/api/*` endpoints (spec §6.1).

use serde::{Deserialize, Serialize};

/// Which motor a `/api/move` jog addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorId {
    Left,
    Right,
}

/// A declared starting pose, accepted in one of three equivalent forms:
/// `(l1, l2)`, `(leftLengthMm, rightLengthMm)`, or `(x, y)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartPosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    #[serde(rename = "leftLengthMm")]
    pub left_length_mm: Option<f64>,
    #[serde(rename = "rightLengthMm")]
    pub right_length_mm: Option<f64>,
    #[serde(rename = "leftSteps")]
    pub left_steps: Option<i64>,
    #[serde(rename = "rightSteps")]
    pub right_steps: Option<i64>,
    #[serde(rename = "penDown")]
    pub pen_down: Option<bool>,
}

/// One point within a `/api/path` batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointRequest {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    #[serde(rename = "penDown")]
    pub pen_down: Option<bool>,
    pub speed: Option<u32>,
}

/// Body of `POST /api/path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathRequest {
    pub reset: Option<bool>,
    #[serde(rename = "endOfJob")]
    pub end_of_job: Option<bool>,
    pub speed: Option<u32>,
    #[serde(rename = "startPosition")]
    pub start_position: Option<StartPosition>,
    #[serde(default)]
    pub points: Vec<PointRequest>,
}

/// Body of `POST /api/move`. `motor` is kept as a raw string (rather than
/// `MotorId`) so an unrecognized value can be surfaced as a 404 "unknown
/// motor" response instead of a 400 body-parse failure (spec §6.1 status
/// codes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub motor: String,
    pub steps: i64,
    pub speed: Option<u32>,
}

/// Body of `POST /api/pen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenRequest {
    #[serde(rename = "penDown")]
    pub pen_down: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiInfo {
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorStatus {
    pub id: MotorId,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LengthsMm {
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Steps {
    pub left: i64,
    pub right: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub initialized: bool,
    pub x_mm: f64,
    pub y_mm: f64,
    #[serde(rename = "penDown")]
    pub pen_down: bool,
    pub lengths_mm: LengthsMm,
    pub steps: Steps,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub size: usize,
    #[serde(rename = "isExecuting")]
    pub is_executing: bool,
}

/// Body returned by `GET /api/status` (and embedded in `/api/path` responses).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub wifi: WifiInfo,
    pub motors: Vec<MotorStatus>,
    pub state: StateSnapshot,
    pub queue: QueueSnapshot,
}

/// Response to a successful `POST /api/path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub accepted: usize,
    #[serde(rename = "queueSize")]
    pub queue_size: usize,
    pub state: StatusResponse,
}

/// Uniform error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

//! Device HTTP Client
//!
//! Thin `reqwest` wrapper around the device's `/api/*` surface, bounded
//! timeouts on every call (spec §5 "Timeouts": chunk submission carries a
//! seconds-scale timeout, status polling uses its own shorter one).
//! Grounded in `klipper-host::mcu_client`'s reconnect-and-retry shape,
//! adapted from a persistent serial connection to per-request HTTP calls.

use polargraph_proto::{PathRequest, PathResponse, StatusResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceClientError {
    #[error("request to device timed out or failed to connect: {0}")]
    Transport(String),
    #[error("device queue is full (429)")]
    Backpressure,
    #[error("device rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl DeviceClientError {
    /// Whether the chunk sender should retry this error with backoff
    /// rather than failing the job outright (spec §4.6 "Retries").
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceClientError::Transport(_) | DeviceClientError::Backpressure)
    }
}

#[derive(Clone)]
pub struct DeviceClient {
    submit: reqwest::Client,
    poll: reqwest::Client,
    base_url: String,
}

impl DeviceClient {
    pub fn new(base_url: String, submit: reqwest::Client, poll: reqwest::Client) -> Self {
        Self { submit, poll, base_url }
    }

    pub async fn send_path(&self, body: &PathRequest) -> Result<PathResponse, DeviceClientError> {
        let resp = self
            .submit
            .post(format!("{}/api/path", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| DeviceClientError::Transport(e.to_string()))?;
        self.parse_json_or_error(resp).await
    }

    pub async fn send_cancel(&self) -> Result<(), DeviceClientError> {
        let resp = self
            .submit
            .post(format!("{}/api/cancel", self.base_url))
            .send()
            .await
            .map_err(|e| DeviceClientError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(DeviceClientError::Rejected {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }

    /// Uses the short poll-specific timeout so a slow device never blocks
    /// the chunk-submission loop (spec §5 "does not block the submission
    /// loop").
    pub async fn get_status(&self) -> Result<StatusResponse, DeviceClientError> {
        let resp = self
            .poll
            .get(format!("{}/api/status", self.base_url))
            .send()
            .await
            .map_err(|e| DeviceClientError::Transport(e.to_string()))?;
        self.parse_json_or_error(resp).await
    }

    async fn parse_json_or_error<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, DeviceClientError> {
        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DeviceClientError::Backpressure);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeviceClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| DeviceClientError::Transport(e.to_string()))
    }
}

//! Status Poller
//!
//! Periodically polls the device's `/api/status` and caches the result on
//! whichever job is currently active, stamping a freshness timestamp (spec
//! §4.6 "Status polling"). Runs independently of the chunk-submission loop
//! so a slow device never blocks batch sending (spec §5 "Timeouts").

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::client::DeviceClient;
use crate::job::JobState;

const STALE_AFTER: Duration = Duration::from_secs(15);

pub async fn run_poller(slot: Arc<Mutex<Option<JobState>>>, device: DeviceClient, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let is_active = {
            let mut guard = slot.lock();
            match guard.as_mut() {
                Some(job) => {
                    job.refresh_staleness(STALE_AFTER.as_secs());
                    job.is_active()
                }
                None => false,
            }
        };
        if !is_active {
            continue;
        }

        match device.get_status().await {
            Ok(status) => {
                let mut guard = slot.lock();
                if let Some(job) = guard.as_mut() {
                    job.attach_controller_status(status);
                }
            }
            Err(err) => debug!(%err, "status poll failed; will retry next tick"),
        }
    }
}

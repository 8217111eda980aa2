//! Frame observer that turns engine callbacks into status output.

use std::sync::atomic::{AtomicBool, Ordering};

use aton_core::{FrameObserver, StatsSnapshot};
use tokio::sync::Notify;
use tracing::info;

/// Logs new image formats and wakes the status printer on updates.
#[derive(Debug, Default)]
pub struct StatusObserver {
    updated: Notify,
    dirty: AtomicBool,
}

impl StatusObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next update and clear the pending flag.
    pub async fn changed(&self) {
        loop {
            let notified = self.updated.notified();
            if self.dirty.swap(false, Ordering::AcqRel) {
                return;
            }
            notified.await;
        }
    }
}

impl FrameObserver for StatusObserver {
    fn format_discovered(&self, width: u32, height: u32) {
        info!("new image format {width}x{height}");
    }

    fn frame_updated(&self) {
        self.dirty.store(true, Ordering::Release);
        self.updated.notify_one();
    }
}

/// One line of status output for `snapshot`.
pub fn render_line(snapshot: &StatsSnapshot, json: bool) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string(snapshot)
    } else {
        Ok(snapshot.to_string())
    }
}

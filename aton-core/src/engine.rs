//! Per-instance entry point for hosts embedding the engine.
//!
//! An [`EngineHandle`] owns the listener and the shared frame. Hosts keep
//! one per viewer node; nothing is process-global.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::buffer::Pixel;
use crate::error::BindError;
use crate::frame::{FrameObserver, NoopObserver, SharedFrame};
use crate::network::Listener;
use crate::state::SessionPhase;
use crate::stats::StatsSnapshot;

/// Port renderers connect to unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9201;

pub struct EngineHandle {
    frame: Arc<SharedFrame>,
    listener: Mutex<Listener>,
    phase: watch::Receiver<SessionPhase>,
}

impl EngineHandle {
    pub fn new(observer: Arc<dyn FrameObserver>) -> Self {
        let frame = Arc::new(SharedFrame::new());
        let listener = Listener::new(Arc::clone(&frame), observer);
        Self::from_parts(frame, listener)
    }

    /// Like [`new`](Self::new) but bound to a single interface.
    pub fn with_bind_ip(observer: Arc<dyn FrameObserver>, ip: IpAddr) -> Self {
        let frame = Arc::new(SharedFrame::new());
        let listener = Listener::new(Arc::clone(&frame), observer).with_bind_ip(ip);
        Self::from_parts(frame, listener)
    }

    fn from_parts(frame: Arc<SharedFrame>, listener: Listener) -> Self {
        let phase = listener.phase();
        Self {
            frame,
            listener: Mutex::new(listener),
            phase,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub async fn start(&self, port: u16) -> Result<(), BindError> {
        self.listener.lock().await.start(port).await
    }

    /// After this returns the frame no longer changes and the port is free.
    pub async fn stop(&self) {
        self.listener.lock().await.stop().await
    }

    /// Call when the configured port changes.
    pub async fn restart(&self, port: u16) -> Result<(), BindError> {
        self.listener.lock().await.restart(port).await
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.local_addr()
    }

    pub async fn is_running(&self) -> bool {
        self.listener.lock().await.is_running()
    }

    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.clone()
    }

    // ── Frame access ─────────────────────────────────────────────

    /// Shared frame for readers on other threads.
    pub fn frame(&self) -> Arc<SharedFrame> {
        Arc::clone(&self.frame)
    }

    pub fn read(&self, x: i64, y: i64) -> Pixel {
        self.frame.read(x, y)
    }

    pub fn read_row(&self, y: i64, x_start: i64, x_end: i64) -> Vec<Pixel> {
        self.frame.read_row(y, x_start, x_end)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.frame.stats()
    }

    pub fn generation(&self) -> u64 {
        self.frame.generation()
    }

    /// Withhold per-bucket `frame_updated` calls while an export runs.
    pub fn set_capturing(&self, capturing: bool) {
        self.frame.set_capturing(capturing);
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn idle_engine_reads_transparent() {
        let engine = EngineHandle::default();
        assert_eq!(engine.dimensions(), (0, 0));
        assert_eq!(engine.read_row(0, 0, 2), vec![Pixel::TRANSPARENT; 2]);
        assert_eq!(engine.stats(), StatsSnapshot::default());
        assert!(!engine.is_running().await);
        engine.stop().await;
    }

    #[tokio::test]
    async fn start_stop_cycle() {
        let engine = EngineHandle::with_bind_ip(
            Arc::new(NoopObserver),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        );
        engine.start(0).await.unwrap();
        assert!(engine.is_running().await);
        assert!(engine.local_addr().await.is_some());
        engine.stop().await;
        engine.stop().await;
        assert!(engine.local_addr().await.is_none());
    }

    #[test]
    fn capture_flag_reaches_frame() {
        let engine = EngineHandle::default();
        engine.set_capturing(true);
        assert!(engine.frame().is_capturing());
    }
}

//! One renderer connection: decode messages and apply them in order.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::AtonCodec;
use crate::error::AtonError;
use crate::frame::{FrameObserver, SharedFrame};
use crate::message::{Message, OpenImage, TileData};
use crate::state::SessionPhase;

/// Why a session stopped reading its connection.
#[derive(Debug)]
pub enum SessionEnd {
    /// The renderer closed the connection between messages.
    Disconnected,
    /// The renderer sent `Shutdown`; the listener should stop accepting.
    Shutdown,
    /// `stop()` was requested by the host.
    Cancelled,
    /// Bad bytes or a broken transport ended this connection.
    Failed(AtonError),
}

/// Applies a connection's messages to the shared frame.
pub struct Session<'a> {
    frame: &'a SharedFrame,
    observer: &'a Arc<dyn FrameObserver>,
    phase: &'a watch::Sender<SessionPhase>,
}

impl<'a> Session<'a> {
    pub fn new(
        frame: &'a SharedFrame,
        observer: &'a Arc<dyn FrameObserver>,
        phase: &'a watch::Sender<SessionPhase>,
    ) -> Self {
        Self {
            frame,
            observer,
            phase,
        }
    }

    /// Read and apply messages until the connection ends or `cancel` fires.
    pub async fn run<R>(&mut self, reader: R, cancel: &CancellationToken) -> SessionEnd
    where
        R: AsyncRead + Unpin,
    {
        let mut messages = FramedRead::new(reader, AtonCodec::new());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = messages.next() => next,
            };

            let message = match next {
                None => return SessionEnd::Disconnected,
                Some(Err(e)) => return SessionEnd::Failed(e),
                Some(Ok(message)) => message,
            };

            if let ControlFlow::Break(end) = self.handle(message) {
                return end;
            }
        }
    }

    /// Apply one decoded message.
    pub fn handle(&mut self, message: Message) -> ControlFlow<SessionEnd> {
        match message {
            Message::OpenImage(open) => return self.on_open(open),
            Message::TileData(tile) => self.on_tile(&tile),
            Message::CloseImage => self.on_close(),
            Message::Shutdown => {
                info!("renderer requested shutdown");
                self.phase.send_modify(SessionPhase::terminate);
                return ControlFlow::Break(SessionEnd::Shutdown);
            }
        }
        ControlFlow::Continue(())
    }

    fn on_open(&mut self, open: OpenImage) -> ControlFlow<SessionEnd> {
        if let Err(e) = self.frame.open(&open) {
            warn!(width = open.width, height = open.height, "cannot open image: {e}");
            return ControlFlow::Break(SessionEnd::Failed(e));
        }
        self.transition(SessionPhase::open_image);
        info!(
            width = open.width,
            height = open.height,
            region = open.render_region_area,
            "image opened"
        );
        self.observer.format_discovered(open.width, open.height);
        ControlFlow::Continue(())
    }

    fn on_tile(&mut self, tile: &TileData) {
        if !self.phase.borrow().is_streaming() {
            debug!(x = tile.x, y = tile.y, "bucket received outside an open image");
        }

        let report = self.frame.apply_tile(tile);
        if report.clipped > 0 {
            debug!(
                x = tile.x,
                y = tile.y,
                width = tile.width,
                height = tile.height,
                clipped = report.clipped,
                "bucket clipped to image bounds"
            );
        }

        // Buffer and stats are current either way; only the redraw waits.
        if self.frame.is_capturing() {
            return;
        }
        self.notify();
    }

    fn on_close(&mut self) {
        let open_for = self.phase.borrow().streaming_duration();
        self.transition(SessionPhase::close_image);
        self.frame.close();
        let stats = self.frame.stats();
        info!(%stats, ?open_for, "image closed");
        self.notify();
    }

    fn notify(&self) {
        self.frame.bump_generation();
        self.observer.frame_updated();
    }

    fn transition(&self, step: fn(&mut SessionPhase) -> Result<(), AtonError>) {
        self.phase.send_modify(|phase| {
            if let Err(e) = step(phase) {
                debug!(%phase, "{e}");
            }
        });
    }
}

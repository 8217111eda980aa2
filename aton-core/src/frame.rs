//! The framebuffer and statistics shared between the session loop and
//! the host.
//!
//! Buffer and stats sit behind one mutex so a reader never sees pixels
//! from one bucket paired with stats from another. Every critical section
//! is bounded by a single bucket's pixel count.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::buffer::{CompositeReport, FrameBuffer, Pixel};
use crate::error::AtonError;
use crate::message::{OpenImage, TileData};
use crate::stats::{StatsSnapshot, StatsTracker};

// ── FrameObserver ────────────────────────────────────────────────

/// Hooks the host registers to hear about stream events.
///
/// Called from the listener task; implementations should return quickly
/// (schedule a redraw, bump a counter) rather than read the whole frame.
pub trait FrameObserver: Send + Sync + 'static {
    /// A new image was opened with this display geometry.
    fn format_discovered(&self, _width: u32, _height: u32) {}

    /// New pixels are available (suppressed per bucket while capturing).
    fn frame_updated(&self) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FrameObserver for NoopObserver {}

// ── SharedFrame ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FrameState {
    buffer: FrameBuffer,
    stats: StatsTracker,
}

/// Thread-safe framebuffer + stats pair.
#[derive(Debug, Default)]
pub struct SharedFrame {
    state: Mutex<FrameState>,
    capturing: AtomicBool,
    generation: AtomicU64,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameState> {
        // Plain data: a panic mid-write cannot leave it unusable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn read(&self, x: i64, y: i64) -> Pixel {
        self.lock().buffer.read(x, y)
    }

    pub fn read_row(&self, y: i64, x_start: i64, x_end: i64) -> Vec<Pixel> {
        self.lock().buffer.read_row(y, x_start, x_end)
    }

    /// Current `(width, height)`; `(0, 0)` before the first image.
    pub fn dimensions(&self) -> (u32, u32) {
        let state = self.lock();
        (state.buffer.width(), state.buffer.height())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.lock().stats.snapshot()
    }

    /// Pixel rows together with the stats they were read alongside.
    pub fn read_rows_with_stats(&self, rows: std::ops::Range<i64>) -> (Vec<Vec<Pixel>>, StatsSnapshot) {
        let state = self.lock();
        let width = state.buffer.width() as i64;
        let pixels = rows.map(|y| state.buffer.read_row(y, 0, width)).collect();
        (pixels, state.stats.snapshot())
    }

    /// Wrapping counter bumped on every delivered update notification.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    // ── Capture flag ─────────────────────────────────────────────

    /// While set, per-bucket update notifications are withheld.
    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::SeqCst);
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    // ── Writes (session loop) ────────────────────────────────────

    /// Reallocate for a new image. Stats are left alone if allocation fails.
    pub(crate) fn open(&self, open: &OpenImage) -> Result<(), AtonError> {
        let mut state = self.lock();
        state.buffer.resize(open.width, open.height)?;
        state
            .stats
            .on_open(open.full_area(), open.render_region_area as u64);
        Ok(())
    }

    pub(crate) fn apply_tile(&self, tile: &TileData) -> CompositeReport {
        let mut state = self.lock();
        state.stats.on_tile(tile.area(), tile.ram, tile.elapsed_ms);
        let report = state.buffer.composite(tile);
        if report.clipped > 0 {
            state.stats.on_clipped(report.clipped);
        }
        report
    }

    pub(crate) fn close(&self) {
        self.lock().stats.on_close();
    }

    pub(crate) fn bump_generation(&self) -> u64 {
        self.generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }
}

//! Render progress, memory and time derived from the bucket stream.

use std::fmt;

use serde::Serialize;

/// Point-in-time copy of the session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Percentage of the render region received, 0–100.
    pub progress: u32,
    /// Renderer memory in bytes, as of the latest bucket.
    pub ram: u64,
    /// Highest `ram` seen so far.
    pub peak_ram: u64,
    /// Render time in milliseconds, as of the latest bucket.
    pub elapsed_time: u32,
    /// Bucket pixels dropped because they fell outside the image.
    pub clipped_pixels: u64,
}

/// Formats the viewer status bar, e.g.
/// `Progress: 50%  Used Memory: 12MB  Peak Memory: 20MB  Time: 00h:01m:05s`.
impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MIB: u64 = 1024 * 1024;
        let hours = self.elapsed_time / (1000 * 60 * 60);
        let minutes = (self.elapsed_time / (1000 * 60)) % 60;
        let seconds = (self.elapsed_time / 1000) % 60;
        write!(
            f,
            "Progress: {}%  Used Memory: {}MB  Peak Memory: {}MB  Time: {:02}h:{:02}m:{:02}s",
            self.progress,
            self.ram / MIB,
            self.peak_ram / MIB,
            hours,
            minutes,
            seconds
        )
    }
}

/// Accumulates statistics for the current open/close cycle.
///
/// Progress is a best-effort estimate: the tracker trusts the areas the
/// renderer declares and does not detect overlapping buckets.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    full_area: u64,
    remaining_area: i128,
    snapshot: StatsSnapshot,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new image. A `render_region_area` of 0 means the renderer
    /// covers the whole frame.
    pub fn on_open(&mut self, full_area: u64, render_region_area: u64) {
        self.full_area = full_area;
        self.remaining_area = if render_region_area == 0 {
            full_area as i128
        } else {
            render_region_area as i128
        };
        self.snapshot.progress = 0;
        self.snapshot.clipped_pixels = 0;
    }

    pub fn on_tile(&mut self, tile_area: u64, ram: u64, elapsed_time: u32) {
        self.remaining_area -= tile_area as i128;
        self.snapshot.progress = if self.full_area == 0 {
            0
        } else {
            let progress = 100 - (self.remaining_area * 100) / self.full_area as i128;
            progress.clamp(0, 100) as u32
        };
        self.snapshot.ram = ram;
        self.snapshot.peak_ram = self.snapshot.peak_ram.max(ram);
        self.snapshot.elapsed_time = elapsed_time;
    }

    pub fn on_clipped(&mut self, pixels: u64) {
        self.snapshot.clipped_pixels += pixels;
    }

    /// Final stats stay as the last bucket left them.
    pub fn on_close(&mut self) {}

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot
    }
}

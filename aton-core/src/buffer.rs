//! RGBA float framebuffer assembled from incoming buckets.
//!
//! Rows are addressed top-down. Renderers emit buckets bottom-up, so
//! [`FrameBuffer::composite`] flips the bucket's vertical axis.

use crate::error::AtonError;
use crate::message::TileData;

// ── Pixel ────────────────────────────────────────────────────────

/// Four float channels: red, green, blue, alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel(pub [f32; 4]);

impl Pixel {
    /// Returned for coordinates that hold no image data.
    pub const TRANSPARENT: Pixel = Pixel([0.0; 4]);
}

/// Black with opaque alpha, so RGB-only buckets stay visible.
impl Default for Pixel {
    fn default() -> Self {
        Pixel([0.0, 0.0, 0.0, 1.0])
    }
}

// ── CompositeReport ──────────────────────────────────────────────

/// Outcome of compositing one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeReport {
    pub written: u64,
    /// Source pixels whose destination fell outside the image.
    pub clipped: u64,
}

// ── FrameBuffer ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl FrameBuffer {
    /// An empty `0 × 0` buffer ("no image yet").
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Discard the current image and allocate `width * height` default pixels.
    ///
    /// On allocation failure the buffer is left empty (`0 × 0`).
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), AtonError> {
        *self = Self::default();
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(AtonError::InvalidGeometry {
                message: "OpenImage",
                width,
                height,
            })?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, Pixel::default());
        *self = Self {
            width,
            height,
            pixels,
        };
        Ok(())
    }

    /// Write a bucket into the image, clipping anything out of bounds.
    ///
    /// Source `(sx, sy)` lands on `(sx + tile.x, height - (sy + tile.y + 1))`.
    /// Only the first `samples_per_pixel` channels are overwritten.
    pub fn composite(&mut self, tile: &TileData) -> CompositeReport {
        let mut report = CompositeReport::default();
        if tile.width == 0 || tile.height == 0 {
            return report;
        }
        let spp = tile.samples_per_pixel.min(4) as usize;
        let width = self.width as i64;
        let height = self.height as i64;

        for sy in 0..tile.height {
            let dy = height - (sy as i64 + tile.y as i64 + 1);
            for sx in 0..tile.width {
                let dx = sx as i64 + tile.x as i64;
                if dx < 0 || dx >= width || dy < 0 || dy >= height {
                    report.clipped += 1;
                    continue;
                }

                let index = (dy * width + dx) as usize;
                let source = tile.sample(sx, sy);
                self.pixels[index].0[..spp].copy_from_slice(&source[..spp]);
                report.written += 1;
            }
        }

        report
    }

    /// The pixel at `(x, y)`, or [`Pixel::TRANSPARENT`] outside the image.
    pub fn read(&self, x: i64, y: i64) -> Pixel {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Pixel::TRANSPARENT;
        }
        self.pixels[(y * self.width as i64 + x) as usize]
    }

    /// Pixels `x_start..x_end` of row `y`, padded with transparent pixels
    /// wherever the range leaves the image.
    pub fn read_row(&self, y: i64, x_start: i64, x_end: i64) -> Vec<Pixel> {
        (x_start..x_end).map(|x| self.read(x, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: i32, y: i32, width: u32, height: u32, spp: u32, fill: f32) -> TileData {
        TileData {
            x,
            y,
            width,
            height,
            samples_per_pixel: spp,
            ram: 0,
            elapsed_ms: 0,
            pixels: vec![fill; (width * height * spp) as usize],
        }
    }

    #[test]
    fn empty_buffer_reads_transparent() {
        let buffer = FrameBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.read(0, 0), Pixel::TRANSPARENT);
        assert_eq!(buffer.read_row(3, 0, 4), vec![Pixel::TRANSPARENT; 4]);
    }

    #[test]
    fn resize_yields_default_pixels() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(3, 2).unwrap();
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(buffer.read(x, y), Pixel::default());
            }
        }
        assert_eq!(buffer.read(3, 0), Pixel::TRANSPARENT);
        assert_eq!(buffer.read(-1, 0), Pixel::TRANSPARENT);
    }

    #[test]
    fn vertical_flip() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(2, 5).unwrap();
        let report = buffer.composite(&tile(0, 0, 2, 2, 4, 0.5));
        assert_eq!(report.written, 4);

        // A bucket at origin with height 2 covers rows 4 and 3.
        for y in 0..5 {
            let expected = if y >= 3 { Pixel([0.5; 4]) } else { Pixel::default() };
            assert_eq!(buffer.read_row(y, 0, 2), vec![expected; 2], "row {y}");
        }
    }

    #[test]
    fn bucket_rows_are_bottom_up() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(1, 2).unwrap();
        let mut t = tile(0, 0, 1, 2, 4, 0.0);
        t.pixels = vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        buffer.composite(&t);
        assert_eq!(buffer.read(0, 1), Pixel([1.0; 4]));
        assert_eq!(buffer.read(0, 0), Pixel([2.0; 4]));
    }

    #[test]
    fn rgb_bucket_keeps_alpha() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(2, 2).unwrap();
        buffer.composite(&tile(0, 0, 2, 2, 3, 0.25));
        assert_eq!(buffer.read(1, 1), Pixel([0.25, 0.25, 0.25, 1.0]));
    }

    #[test]
    fn partially_outside_bucket_is_clipped() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(4, 4).unwrap();
        let report = buffer.composite(&tile(-1, 2, 3, 3, 4, 0.75));
        // Column -1 and the last bucket row (buffer y -1) fall outside.
        assert_eq!(report.written, 4);
        assert_eq!(report.clipped, 5);
        assert_eq!(buffer.read(0, 1), Pixel([0.75; 4]));
        assert_eq!(buffer.read(1, 0), Pixel([0.75; 4]));
        assert_eq!(buffer.read(2, 0), Pixel::default());
    }

    #[test]
    fn fully_outside_bucket_changes_nothing() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(4, 4).unwrap();
        let before = buffer.read_row(0, 0, 4);
        let report = buffer.composite(&tile(10, 10, 2, 2, 4, 9.0));
        assert_eq!(report, CompositeReport { written: 0, clipped: 4 });
        for y in 0..4 {
            assert_eq!(buffer.read_row(y, 0, 4), before);
        }
    }

    #[test]
    fn later_buckets_overwrite() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(2, 2).unwrap();
        buffer.composite(&tile(0, 0, 2, 2, 4, 0.1));
        buffer.composite(&tile(1, 0, 1, 1, 4, 0.9));
        assert_eq!(buffer.read(1, 1), Pixel([0.9; 4]));
        assert_eq!(buffer.read(0, 1), Pixel([0.1; 4]));
    }

    #[test]
    fn zero_width_bucket_is_a_no_op() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(2, 2).unwrap();
        let report = buffer.composite(&tile(0, 0, 0, u32::MAX, 4, 0.0));
        assert_eq!(report, CompositeReport::default());
        assert_eq!(buffer.read_row(0, 0, 2), vec![Pixel::default(); 2]);
    }

    #[test]
    fn oversized_resize_fails_without_panicking() {
        let mut buffer = FrameBuffer::new();
        buffer.resize(2, 2).unwrap();
        assert!(buffer.resize(u32::MAX, u32::MAX).is_err());
        assert!(buffer.is_empty());
        assert_eq!((buffer.width(), buffer.height()), (0, 0));
        assert_eq!(buffer.read(0, 0), Pixel::TRANSPARENT);
    }

    #[test]
    fn composite_into_empty_buffer_clips_everything() {
        let mut buffer = FrameBuffer::new();
        let report = buffer.composite(&tile(0, 0, 2, 2, 4, 1.0));
        assert_eq!(report.clipped, 4);
        assert!(buffer.is_empty());
    }
}

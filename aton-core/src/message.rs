//! Protocol message types and their payload layouts.
//!
//! Uses proper enums with `TryFrom`: an unknown tag is an error, never
//! coerced into one of the known messages.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::AtonError;

// ── MessageType ──────────────────────────────────────────────────

/// Discriminant carried in every [`MessageHeader`](crate::MessageHeader).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A new image begins; the framebuffer is reallocated.
    OpenImage = 0,
    /// One rendered bucket of pixels.
    TileData = 1,
    /// The current image is complete.
    CloseImage = 2,
    /// The renderer asks the listener to stop.
    Shutdown = 9,
}

impl TryFrom<u32> for MessageType {
    type Error = AtonError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::OpenImage),
            1 => Ok(MessageType::TileData),
            2 => Ok(MessageType::CloseImage),
            9 => Ok(MessageType::Shutdown),
            _ => Err(AtonError::UnknownVariant {
                type_name: "MessageType",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Payloads ─────────────────────────────────────────────────────

/// Largest image a renderer may open: 8192 × 8192 pixels (1 GiB of RGBA f32).
pub const MAX_IMAGE_PIXELS: u64 = 8192 * 8192;

/// Geometry announced when a render starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenImage {
    pub width: u32,
    pub height: u32,
    /// Pixel count of the region actually rendered; 0 or `width * height`
    /// when the renderer covers the whole frame.
    pub render_region_area: u32,
}

impl OpenImage {
    pub const PAYLOAD_SIZE: usize = 12;

    pub fn full_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// One bucket of rendered pixels.
///
/// `pixels` is row-major, `samples_per_pixel` floats per pixel, with the
/// first row being the bottom-most row of the bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    /// Renderer memory use in bytes when the bucket finished.
    pub ram: u64,
    /// Render time so far in milliseconds.
    pub elapsed_ms: u32,
    pub pixels: Vec<f32>,
}

impl TileData {
    /// Size of the fields preceding the pixel array.
    pub const FIXED_SIZE: usize = 32;

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Channels of source pixel `(sx, sy)`.
    pub fn sample(&self, sx: u32, sy: u32) -> &[f32] {
        let spp = self.samples_per_pixel as usize;
        let offset = (sy as usize * self.width as usize + sx as usize) * spp;
        &self.pixels[offset..offset + spp]
    }
}

// ── Message ──────────────────────────────────────────────────────

/// A fully decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    OpenImage(OpenImage),
    TileData(TileData),
    CloseImage,
    Shutdown,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::OpenImage(_) => MessageType::OpenImage,
            Message::TileData(_) => MessageType::TileData,
            Message::CloseImage => MessageType::CloseImage,
            Message::Shutdown => MessageType::Shutdown,
        }
    }

    /// Serialize the payload (everything after the header).
    pub fn encode_payload(&self) -> Bytes {
        match self {
            Message::OpenImage(open) => {
                let mut buf = BytesMut::with_capacity(OpenImage::PAYLOAD_SIZE);
                buf.put_u32_le(open.width);
                buf.put_u32_le(open.height);
                buf.put_u32_le(open.render_region_area);
                buf.freeze()
            }
            Message::TileData(tile) => {
                let mut buf =
                    BytesMut::with_capacity(TileData::FIXED_SIZE + tile.pixels.len() * 4);
                buf.put_i32_le(tile.x);
                buf.put_i32_le(tile.y);
                buf.put_u32_le(tile.width);
                buf.put_u32_le(tile.height);
                buf.put_u32_le(tile.samples_per_pixel);
                buf.put_u64_le(tile.ram);
                buf.put_u32_le(tile.elapsed_ms);
                for value in &tile.pixels {
                    buf.put_f32_le(*value);
                }
                buf.freeze()
            }
            Message::CloseImage | Message::Shutdown => Bytes::new(),
        }
    }

    /// Parse a payload whose header announced `message_type`.
    pub fn decode_payload(message_type: MessageType, mut payload: Bytes) -> Result<Self, AtonError> {
        match message_type {
            MessageType::OpenImage => {
                expect_length("OpenImage", OpenImage::PAYLOAD_SIZE as u128, payload.len())?;
                let open = OpenImage {
                    width: payload.get_u32_le(),
                    height: payload.get_u32_le(),
                    render_region_area: payload.get_u32_le(),
                };
                if open.full_area() > MAX_IMAGE_PIXELS {
                    return Err(AtonError::InvalidGeometry {
                        message: "OpenImage",
                        width: open.width,
                        height: open.height,
                    });
                }
                Ok(Message::OpenImage(open))
            }
            MessageType::TileData => {
                if payload.len() < TileData::FIXED_SIZE {
                    return Err(AtonError::InvalidPayloadLength {
                        message: "TileData",
                        expected: TileData::FIXED_SIZE,
                        actual: payload.len(),
                    });
                }
                let x = payload.get_i32_le();
                let y = payload.get_i32_le();
                let width = payload.get_u32_le();
                let height = payload.get_u32_le();
                let samples_per_pixel = payload.get_u32_le();
                let ram = payload.get_u64_le();
                let elapsed_ms = payload.get_u32_le();

                if !(1..=4).contains(&samples_per_pixel) {
                    return Err(AtonError::UnsupportedSamplesPerPixel(samples_per_pixel));
                }
                if width == 0 || height == 0 {
                    return Err(AtonError::InvalidGeometry {
                        message: "TileData",
                        width,
                        height,
                    });
                }

                let pixel_bytes =
                    width as u128 * height as u128 * samples_per_pixel as u128 * 4;
                expect_length(
                    "TileData",
                    TileData::FIXED_SIZE as u128 + pixel_bytes,
                    TileData::FIXED_SIZE + payload.len(),
                )?;

                let mut pixels = Vec::with_capacity(payload.len() / 4);
                while payload.has_remaining() {
                    pixels.push(payload.get_f32_le());
                }

                Ok(Message::TileData(TileData {
                    x,
                    y,
                    width,
                    height,
                    samples_per_pixel,
                    ram,
                    elapsed_ms,
                    pixels,
                }))
            }
            MessageType::CloseImage => {
                expect_length("CloseImage", 0, payload.len())?;
                Ok(Message::CloseImage)
            }
            MessageType::Shutdown => {
                expect_length("Shutdown", 0, payload.len())?;
                Ok(Message::Shutdown)
            }
        }
    }
}

fn expect_length(message: &'static str, expected: u128, actual: usize) -> Result<(), AtonError> {
    if expected == actual as u128 {
        return Ok(());
    }
    Err(AtonError::InvalidPayloadLength {
        message,
        expected: usize::try_from(expected).unwrap_or(usize::MAX),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(spp: u32, pixels: Vec<f32>) -> TileData {
        TileData {
            x: -2,
            y: 3,
            width: 2,
            height: 1,
            samples_per_pixel: spp,
            ram: 64 * 1024 * 1024,
            elapsed_ms: 1500,
            pixels,
        }
    }

    #[test]
    fn message_type_invalid() {
        assert!(MessageType::try_from(3).is_err());
        assert!(MessageType::try_from(0xFF).is_err());
        assert_eq!(MessageType::try_from(9).unwrap(), MessageType::Shutdown);
    }

    #[test]
    fn tile_payload_layout() {
        let msg = Message::TileData(tile(3, vec![0.25; 6]));
        let payload = msg.encode_payload();
        assert_eq!(payload.len(), TileData::FIXED_SIZE + 6 * 4);
        assert_eq!(&payload[0..4], &(-2i32).to_le_bytes());

        let decoded = Message::decode_payload(MessageType::TileData, payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn short_tile_payload_rejected() {
        let mut t = tile(4, vec![1.0; 8]);
        t.pixels.truncate(7);
        let payload = Message::TileData(t).encode_payload();
        let err = Message::decode_payload(MessageType::TileData, payload).unwrap_err();
        assert!(matches!(
            err,
            AtonError::InvalidPayloadLength {
                expected: 64,
                actual: 60,
                ..
            }
        ));
    }

    #[test]
    fn oversized_geometry_does_not_overflow() {
        let t = TileData {
            width: u32::MAX,
            height: u32::MAX,
            ..tile(4, Vec::new())
        };
        let payload = Message::TileData(t).encode_payload();
        assert!(matches!(
            Message::decode_payload(MessageType::TileData, payload),
            Err(AtonError::InvalidPayloadLength { .. })
        ));
    }

    #[test]
    fn zero_area_tile_rejected() {
        let t = TileData {
            width: 0,
            height: u32::MAX,
            ..tile(4, Vec::new())
        };
        let payload = Message::TileData(t).encode_payload();
        assert_eq!(payload.len(), TileData::FIXED_SIZE);
        assert!(matches!(
            Message::decode_payload(MessageType::TileData, payload),
            Err(AtonError::InvalidGeometry {
                width: 0,
                height: u32::MAX,
                ..
            })
        ));
    }

    #[test]
    fn open_image_size_limit() {
        let huge = Message::OpenImage(OpenImage {
            width: u32::MAX,
            height: u32::MAX,
            render_region_area: 0,
        });
        assert!(matches!(
            Message::decode_payload(MessageType::OpenImage, huge.encode_payload()),
            Err(AtonError::InvalidGeometry { .. })
        ));

        let largest = Message::OpenImage(OpenImage {
            width: 8192,
            height: 8192,
            render_region_area: 0,
        });
        assert_eq!(
            Message::decode_payload(MessageType::OpenImage, largest.encode_payload()).unwrap(),
            largest
        );
    }

    #[test]
    fn bad_samples_per_pixel_rejected() {
        let payload = Message::TileData(tile(5, vec![0.0; 10])).encode_payload();
        assert!(matches!(
            Message::decode_payload(MessageType::TileData, payload),
            Err(AtonError::UnsupportedSamplesPerPixel(5))
        ));
    }

    #[test]
    fn close_with_payload_rejected() {
        let payload = Bytes::from_static(&[1, 2]);
        assert!(Message::decode_payload(MessageType::CloseImage, payload).is_err());
    }

    #[test]
    fn sample_indexing() {
        let t = TileData {
            width: 2,
            height: 2,
            samples_per_pixel: 3,
            pixels: (0..12).map(|v| v as f32).collect(),
            ..tile(3, Vec::new())
        };
        assert_eq!(t.sample(1, 1), &[9.0, 10.0, 11.0]);
        assert_eq!(t.sample(0, 1), &[6.0, 7.0, 8.0]);
    }
}

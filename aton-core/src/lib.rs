//! # aton-core
//!
//! Streaming render-tile ingestion for the Aton display driver protocol.
//!
//! This crate contains:
//! - **Protocol types**: `MessageHeader`, `MessageType`, `Message`, `OpenImage`, `TileData`
//! - **Codec**: `AtonCodec` for framed TCP I/O via `tokio_util`
//! - **Frame**: `FrameBuffer` assembly with vertical flip and clipping, `SharedFrame`
//! - **Stats**: `StatsTracker` for progress, memory and render time
//! - **Network**: `Listener` and `Session` (receiving), `RenderSender` (sending)
//! - **State**: `SessionPhase` state machine
//! - **Engine**: `EngineHandle`, the per-instance API hosts embed
//! - **Error**: `AtonError` and `BindError`, `thiserror`-based

pub mod buffer;
pub mod codec;
pub mod engine;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;
pub mod network;
pub mod state;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{CompositeReport, FrameBuffer, Pixel};
pub use codec::{AtonCodec, MAX_PAYLOAD_SIZE};
pub use engine::{DEFAULT_PORT, EngineHandle};
pub use error::{AtonError, BindError};
pub use frame::{FrameObserver, NoopObserver, SharedFrame};
pub use header::{HEADER_SIZE, MessageHeader};
pub use message::{MAX_IMAGE_PIXELS, Message, MessageType, OpenImage, TileData};
pub use network::{Listener, RenderSender, Session, SessionEnd};
pub use state::SessionPhase;
pub use stats::{StatsSnapshot, StatsTracker};

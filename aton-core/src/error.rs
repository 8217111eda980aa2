//! Domain-specific error types for the Aton engine.
//!
//! Connection-level failures are `AtonError`; they end one session and the
//! listener keeps accepting. `BindError` is kept apart because it is the
//! only failure a caller can act on (pick another port).

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// The canonical error type for the Aton protocol and session loop.
#[derive(Debug, Error)]
pub enum AtonError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// Received bytes that do not start with the `ATN0` magic sequence.
    #[error("invalid magic bytes: expected ATN0")]
    InvalidMagic,

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// The payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The declared payload exceeds the codec limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload length does not match what the message declares.
    #[error("invalid {message} payload length: expected {expected}, got {actual}")]
    InvalidPayloadLength {
        message: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tile declared a channel count the buffer cannot hold.
    #[error("unsupported samples per pixel: {0}")]
    UnsupportedSamplesPerPixel(u32),

    /// A tile with no pixels, or an image too large to allocate.
    #[error("invalid {message} geometry: {width}x{height}")]
    InvalidGeometry {
        message: &'static str,
        width: u32,
        height: u32,
    },

    /// The host could not allocate the framebuffer for an image.
    #[error("cannot allocate framebuffer: {0}")]
    Allocation(#[from] TryReserveError),

    /// A message arrived in a session phase that cannot accept it.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The peer closed the stream in the middle of a message.
    #[error("stream truncated: {0} bytes of an incomplete message")]
    Truncated(usize),

    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
}

impl AtonError {
    /// Returns `true` for failures of the connection itself rather than of
    /// the bytes it carried.
    pub fn is_transport(&self) -> bool {
        matches!(self, AtonError::Connection(_))
    }
}

/// Failure to open the listening socket.
#[derive(Debug, Error)]
pub enum BindError {
    /// The OS refused the bind (port in use, insufficient privilege, ...).
    #[error("could not listen on port {port}: {source}")]
    Unavailable {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// `start` was called while the listener already owns a socket.
    #[error("already listening on port {0}")]
    AlreadyListening(u16),
}

impl BindError {
    /// The port the failed `start` asked for, or the one already held.
    pub fn port(&self) -> u16 {
        match self {
            BindError::Unavailable { port, .. } => *port,
            BindError::AlreadyListening(port) => *port,
        }
    }
}

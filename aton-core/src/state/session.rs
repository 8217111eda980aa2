//! Session state machine driven by the listener.
//!
//! Transitions return `Result` instead of panicking so the session loop
//! can log an unexpected ordering and carry on.

use std::time::Instant;

use crate::error::AtonError;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of the listener's single session slot.
///
/// ```text
///  Idle ──► Accepting ──► Connected ──► Streaming ◄──► Closed
///               ▲              │            │             │
///               │              ▼            ▼             ▼
///               └────────────────── Terminating ◄─────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No socket yet. Initial state.
    #[default]
    Idle,

    /// Bound and waiting for a renderer to connect.
    Accepting,

    /// A renderer is connected but has not opened an image.
    Connected,

    /// Inside an open image, compositing buckets.
    Streaming {
        /// When the current image was opened.
        since: Instant,
    },

    /// The image was closed; another may be opened on the same connection.
    Closed,

    /// The connection is ending (shutdown, peer gone, or bad data).
    Terminating,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Accepting => write!(f, "Accepting"),
            Self::Connected => write!(f, "Connected"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Closed => write!(f, "Closed"),
            Self::Terminating => write!(f, "Terminating"),
        }
    }
}

impl SessionPhase {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// How long the current image has been open.
    pub fn streaming_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Streaming { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Idle`, `Terminating`, and `Accepting` (retry after a
    /// failed accept).
    pub fn begin_accept(&mut self) -> Result<(), AtonError> {
        match self {
            Self::Idle | Self::Terminating | Self::Accepting => {
                *self = Self::Accepting;
                Ok(())
            }
            _ => Err(protocol_violation("cannot accept: a session is still active")),
        }
    }

    /// Valid from: `Accepting`.
    pub fn connect(&mut self) -> Result<(), AtonError> {
        match self {
            Self::Accepting => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(protocol_violation("cannot connect: not accepting")),
        }
    }

    /// Valid from: `Connected`, `Closed`, `Streaming` (re-open replaces
    /// the current image).
    pub fn open_image(&mut self) -> Result<(), AtonError> {
        match self {
            Self::Connected | Self::Closed | Self::Streaming { .. } => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(protocol_violation("cannot open image: no connection")),
        }
    }

    /// Valid from: `Streaming`.
    pub fn close_image(&mut self) -> Result<(), AtonError> {
        match self {
            Self::Streaming { .. } => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(protocol_violation("cannot close image: no image open")),
        }
    }

    /// Force to `Terminating` regardless of current state.
    pub fn terminate(&mut self) {
        *self = Self::Terminating;
    }

    /// Back to `Idle` once the socket is released.
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

fn protocol_violation(reason: &'static str) -> AtonError {
    AtonError::ProtocolViolation(reason)
}

// ── Tests ────────────────────────────────────────────────────────

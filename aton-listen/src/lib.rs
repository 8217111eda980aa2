//! # aton-listen: headless Aton host
//!
//! Binds the Aton port, assembles whatever a renderer streams into an
//! in-memory frame and prints the render status line as buckets arrive.
//!
//! ## Modes
//!
//! - **Text**: one human-readable status line per update (default).
//! - **JSON**: one `StatsSnapshot` object per line (`--json`).

pub mod config;
pub mod status;

//! Crate-wide error type.
//!
//! Only startup and collaborator failures live here. The animation and
//! countdown hot path is total and never produces one of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The deadline string did not match `YYYY-MM-DD HH:MM:SS`.
    #[error("invalid deadline {input:?}: {reason}")]
    InvalidDeadlineFormat { input: String, reason: String },

    /// Panel too small to host the heat grid margins.
    #[error("panel {cols}x{rows} is too small (need at least 3 columns and 1 row)")]
    InvalidPanel { cols: u32, rows: u32 },

    #[error("time sync failed after {attempts} attempts: {last}")]
    TimeSyncExhausted { attempts: u32, last: String },

    #[error("invalid HTTP date header: {0}")]
    InvalidHttpDate(String),

    /// The LED matrix driver refused to start.
    #[error("failed to initialize LED matrix: {0}")]
    Display(String),

    #[error("frame thread panicked")]
    FrameThreadPanicked,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

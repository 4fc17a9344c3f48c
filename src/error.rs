//! Error types for the pixel board

use thiserror::Error;

/// Result type alias for board operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving or persisting the canvas
#[derive(Error, Debug)]
pub enum Error {
    /// Coordinates outside the canvas grid
    #[error("pixel ({x}, {y}) is outside the {width}x{height} canvas")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// Request body could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Appending to the durable log failed
    #[error("failed to persist pixel write: {0}")]
    PersistFailed(String),

    /// The log could not be replayed at startup
    #[error("failed to initialize canvas from log: {0}")]
    InitFailed(String),

    /// A persisted record could not be decoded
    #[error("corrupt log record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    /// PNG encoding failed
    #[error("failed to encode canvas: {0}")]
    Encode(String),

    /// I/O error from the underlying store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

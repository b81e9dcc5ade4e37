//! Error types for duke-biff

use thiserror::Error;

/// Result type for record-layer operations
pub type BiffResult<T> = std::result::Result<T, BiffError>;

/// Errors that can occur while reading or writing a BIFF8 record stream.
///
/// Format errors are fatal: iteration aborts and no partial record is
/// returned. Unrecognized record type IDs are *not* errors — they decode
/// into an opaque passthrough record instead.
#[derive(Debug, Error)]
pub enum BiffError {
    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed stream: bad chunk length, out-of-sequence continuation,
    /// truncated field, byte-count mismatch in a nested decode
    #[error("Invalid BIFF format: {0}")]
    Format(String),
}

impl BiffError {
    /// Create a format error with a message
    pub fn format<S: Into<String>>(msg: S) -> Self {
        BiffError::Format(msg.into())
    }
}

//! Error types for the rotating log sink.

use std::io;
use std::path::PathBuf;

/// Result type for rotating logger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the rotating logger.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single write request was larger than the configured maximum file
    /// size. Rejected before any I/O; no state is mutated.
    #[error("write request of {requested} bytes exceeds maximum file size of {max} bytes")]
    WriteTooLarge {
        /// Length of the rejected buffer.
        requested: u64,
        /// Configured maximum file size in bytes.
        max: u64,
    },

    /// Failed to create the log directory.
    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// I/O error from the filesystem during open, rotate, or write.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] io::Error),
}

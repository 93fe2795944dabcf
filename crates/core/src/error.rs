//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("line size estimation failed: {0}")]
    Estimation(String),

    #[error("chunk planning failed: {0}")]
    Planning(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error(
        "chunk {chunk_id}: a line crosses the padded read range {read_start}..{read_end}; \
         lines longer than twice the estimated average are not supported"
    )]
    LineExceedsPadding {
        chunk_id: u32,
        read_start: u64,
        read_end: u64,
    },

    #[error("read range mismatch for chunk {chunk_id}: expected {expected} bytes, got {actual}")]
    ShortRead {
        chunk_id: u32,
        expected: u64,
        actual: u64,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

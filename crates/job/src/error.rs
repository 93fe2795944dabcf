//! Job error types.

use rechunk_storage::StorageError;
use thiserror::Error;

/// Why a chunk could not produce its part.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Boundary(#[from] rechunk_core::Error),
}

/// Job error type. Every variant is fatal to the whole job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Estimation(#[source] rechunk_core::Error),

    #[error("{0}")]
    Planning(#[source] rechunk_core::Error),

    #[error("{0}")]
    Header(#[source] rechunk_core::Error),

    #[error("part {part_number}: read failed: {source}")]
    Read {
        part_number: u32,
        #[source]
        source: ReadError,
    },

    #[error("part {part_number}: upload failed: {source}")]
    Upload {
        part_number: u32,
        #[source]
        source: StorageError,
    },

    #[error(
        "part {part_number}: payload of {size} bytes is below the {minimum} byte \
         minimum {backend} accepts for a non-final part"
    )]
    PartTooSmall {
        part_number: u32,
        size: u64,
        minimum: u64,
        backend: &'static str,
    },

    #[error("completing multipart upload failed: {0}")]
    Finalize(#[source] StorageError),

    #[error("part list does not match the plan: {0}")]
    Reconciliation(String),

    #[error("output has {actual} lines, expected {expected}")]
    Verification { expected: u64, actual: u64 },

    #[error("part {part_number}: worker task failed: {message}")]
    Task { part_number: u32, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

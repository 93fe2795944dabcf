//! Re-chunking job for large delimited objects.
//!
//! This crate provides:
//! - Chunk execution: one padded range read and line reconstruction per chunk
//! - Multipart upload coordination with part reconciliation
//! - The orchestrator that plans, fans out and completes a job

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod orchestrator;

pub use coordinator::{UploadCoordinator, UploadSession, UploadedPart};
pub use error::{JobError, ReadError, Result};
pub use executor::ChunkExecutor;
pub use orchestrator::{JobSummary, Orchestrator};

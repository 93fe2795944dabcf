//! Core domain logic for rechunk.
//!
//! This crate holds the pure, I/O-free parts of the reformatting pipeline:
//! - Terminator-aware line iteration over raw bytes
//! - Line size estimation from a bounded sample
//! - Chunk planning over the whole object
//! - Header parsing and reconstruction
//! - Per-chunk line-boundary reconstruction
//! - Configuration types shared by the other crates

pub mod config;
pub mod error;
pub mod estimate;
pub mod execute;
pub mod header;
pub mod lines;
pub mod plan;

pub use error::{Error, Result};
pub use estimate::{LineEstimate, detect_terminator_width, estimate};
pub use execute::{ExecutedPart, ReadRange, reconstruct};
pub use header::Header;
pub use plan::{ChunkSpec, plan_chunks};

/// Default number of lines sampled by the estimator.
pub const DEFAULT_SAMPLE_LINES: usize = 100;

/// Default sample window: 1 MiB.
pub const DEFAULT_SAMPLE_WINDOW_BYTES: u64 = 1024 * 1024;

/// Default worker pool size.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default minimum lines per chunk.
pub const DEFAULT_MIN_LINES_PER_CHUNK: u64 = 5000;

/// Default minimum chunk size: 5 MiB.
pub const DEFAULT_MIN_CHUNK_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Smallest part S3 accepts for any part but the last: 5 MiB.
pub const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Highest part number a multipart upload accepts.
pub const MAX_PARTS: usize = 10_000;

//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reformatting job configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Key of the delimited source object.
    pub input_key: String,
    /// Key the reassembled output is written to.
    pub output_key: String,
    /// Field delimiter used to split and rebuild the header line.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Maximum number of chunks processed at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Lower bound on lines per chunk (multiplied by the average line size).
    #[serde(default = "default_min_lines_per_chunk")]
    pub min_lines_per_chunk: u64,
    /// Lower bound on chunk size in bytes.
    /// S3 rejects non-final parts under 5 MiB at completion time.
    #[serde(default = "default_min_chunk_size_bytes")]
    pub min_chunk_size_bytes: u64,
    /// Number of lines sampled to estimate the average line size.
    #[serde(default = "default_sample_lines")]
    pub sample_lines: usize,
    /// Size of the object prefix read for sampling and header extraction.
    #[serde(default = "default_sample_window_bytes")]
    pub sample_window_bytes: u64,
    /// Lower-case the header fields before writing them out.
    #[serde(default = "default_lowercase_header")]
    pub lowercase_header: bool,
    /// Re-read the finished object and check its line count.
    #[serde(default)]
    pub verify_output: bool,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_max_concurrency() -> usize {
    crate::DEFAULT_MAX_CONCURRENCY
}

fn default_min_lines_per_chunk() -> u64 {
    crate::DEFAULT_MIN_LINES_PER_CHUNK
}

fn default_min_chunk_size_bytes() -> u64 {
    crate::DEFAULT_MIN_CHUNK_SIZE_BYTES
}

fn default_sample_lines() -> usize {
    crate::DEFAULT_SAMPLE_LINES
}

fn default_sample_window_bytes() -> u64 {
    crate::DEFAULT_SAMPLE_WINDOW_BYTES
}

fn default_lowercase_header() -> bool {
    true
}

impl JobConfig {
    /// Create a job configuration with default tunables.
    pub fn new(input_key: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            input_key: input_key.into(),
            output_key: output_key.into(),
            delimiter: default_delimiter(),
            max_concurrency: default_max_concurrency(),
            min_lines_per_chunk: default_min_lines_per_chunk(),
            min_chunk_size_bytes: default_min_chunk_size_bytes(),
            sample_lines: default_sample_lines(),
            sample_window_bytes: default_sample_window_bytes(),
            lowercase_header: default_lowercase_header(),
            verify_output: false,
        }
    }

    /// Validate job configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.input_key.is_empty() {
            return Err("input_key must not be empty".to_string());
        }
        if self.output_key.is_empty() {
            return Err("output_key must not be empty".to_string());
        }
        if self.input_key == self.output_key {
            return Err("output_key must differ from input_key".to_string());
        }
        if self.delimiter.is_empty() {
            return Err("delimiter must not be empty".to_string());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if self.sample_lines == 0 || self.sample_window_bytes == 0 {
            return Err("sample_lines and sample_window_bytes must be at least 1".to_string());
        }
        if self.min_lines_per_chunk == 0 && self.min_chunk_size_bytes == 0 {
            return Err(
                "min_lines_per_chunk and min_chunk_size_bytes cannot both be zero".to_string(),
            );
        }

        if self.min_chunk_size_bytes < crate::S3_MIN_PART_SIZE {
            tracing::warn!(
                min_chunk_size_bytes = self.min_chunk_size_bytes,
                "min_chunk_size_bytes is below the 5 MiB S3 part minimum; \
                 multi-part jobs on S3 will fail on the first undersized part"
            );
        }

        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage; the root directory stands in for the bucket.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket holding both the input and the output object.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job configuration.
    pub job: JobConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.job.validate()
    }
}

//! Chunk execution: one padded range read, then line reconstruction.

use crate::error::{JobError, ReadError, Result};
use rechunk_core::{ChunkSpec, ExecutedPart, Header, reconstruct};
use rechunk_storage::ObjectStore;
use std::sync::Arc;

/// Executes chunks of one input object. Cheap to clone into worker tasks.
#[derive(Clone)]
pub struct ChunkExecutor {
    store: Arc<dyn ObjectStore>,
    input_key: Arc<str>,
    header: Arc<Header>,
}

impl ChunkExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, input_key: &str, header: Header) -> Self {
        Self {
            store,
            input_key: Arc::from(input_key),
            header: Arc::new(header),
        }
    }

    /// Read `chunk`'s padded range and rebuild the lines it owns.
    pub async fn execute(&self, chunk: ChunkSpec) -> Result<ExecutedPart> {
        let part_number = chunk.id;
        let range = chunk.read_range();
        let read_error = |source: ReadError| JobError::Read {
            part_number,
            source,
        };

        let bytes = self
            .store
            .get_range(&self.input_key, range.start, range.end)
            .await
            .map_err(|e| read_error(e.into()))?;

        tracing::debug!(
            part_number,
            read_start = range.start,
            read_end = range.end,
            read = bytes.len(),
            "chunk range read"
        );

        // Reconstruction is CPU-bound over a buffer of several MiB.
        let header = self.header.clone();
        tokio::task::spawn_blocking(move || reconstruct(&chunk, range, &bytes, &header))
            .await
            .map_err(|e| JobError::Task {
                part_number,
                message: e.to_string(),
            })?
            .map_err(|e| read_error(e.into()))
    }
}

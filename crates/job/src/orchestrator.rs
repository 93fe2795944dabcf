//! Job orchestration: estimate, plan, fan out, reconcile, complete.

use crate::coordinator::{UploadCoordinator, UploadSession, UploadedPart};
use crate::error::{JobError, Result};
use crate::executor::ChunkExecutor;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use rechunk_core::config::JobConfig;
use rechunk_core::{Header, estimate, plan_chunks};
use rechunk_storage::ObjectStore;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of a finished job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Data lines written, excluding the header.
    pub total_records: u64,
    /// Parts in the completed upload.
    pub parts: u32,
    /// Upload id, absent when there was nothing to write.
    pub upload_id: Option<String>,
    /// Bytes in the output object.
    pub bytes_written: u64,
}

/// Runs one re-chunking job against a store.
pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    config: JobConfig,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, config: JobConfig) -> Result<Self> {
        config.validate().map_err(JobError::Config)?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<JobSummary> {
        let config = &self.config;
        let total_size = self.store.head(&config.input_key).await?.size;
        tracing::info!(
            input = %config.input_key,
            output = %config.output_key,
            size = total_size,
            backend = self.store.backend_name(),
            "starting job"
        );
        if total_size == 0 {
            tracing::info!("input object is empty, nothing to do");
            return Ok(JobSummary::default());
        }

        let window_end = total_size.min(config.sample_window_bytes);
        let window = self
            .store
            .get_range(&config.input_key, 0, window_end)
            .await?;
        let estimate = estimate(&window, config.sample_lines).map_err(JobError::Estimation)?;

        let chunks = plan_chunks(
            estimate,
            total_size,
            config.min_lines_per_chunk,
            config.min_chunk_size_bytes,
        )
        .map_err(JobError::Planning)?;
        if chunks.is_empty() {
            tracing::info!(size = total_size, "input holds no lines, nothing to do");
            return Ok(JobSummary::default());
        }

        let header = Header::from_window(
            &window,
            window.len() as u64 >= total_size,
            &config.delimiter,
            config.lowercase_header,
        )
        .map_err(JobError::Header)?;
        tracing::info!(
            chunks = chunks.len(),
            average_line_size = estimate.average_line_size,
            terminator_width = estimate.terminator_width,
            columns = header.fields().len(),
            "planned chunks"
        );

        let coordinator = Arc::new(UploadCoordinator::new(
            self.store.clone(),
            config.output_key.as_str(),
        ));
        let expected_parts = chunks.len() as u32;
        let session = Arc::new(coordinator.begin_session(expected_parts).await?);
        let executor = ChunkExecutor::new(self.store.clone(), &config.input_key, header);

        let uploaded = match self
            .execute_all(chunks, executor, coordinator.clone(), session.clone())
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => {
                coordinator.abort(&session).await;
                return Err(e);
            }
        };

        let total_records = uploaded.iter().map(|p| p.record_count).sum();
        let bytes_written = uploaded.iter().map(|p| p.size).sum();

        if let Err(e) = coordinator.finalize(&session).await {
            coordinator.abort(&session).await;
            return Err(e);
        }

        if config.verify_output {
            self.verify(total_records).await?;
        }

        tracing::info!(
            total_records,
            parts = expected_parts,
            bytes_written,
            "job complete"
        );
        Ok(JobSummary {
            total_records,
            parts: expected_parts,
            upload_id: Some(session.upload_id().to_string()),
            bytes_written,
        })
    }

    /// Run every chunk on a pool of `max_concurrency` workers and wait for
    /// all of them. Returns the lowest-numbered failure, if any.
    async fn execute_all(
        &self,
        chunks: Vec<rechunk_core::ChunkSpec>,
        executor: ChunkExecutor,
        coordinator: Arc<UploadCoordinator>,
        session: Arc<UploadSession>,
    ) -> Result<Vec<UploadedPart>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = FuturesUnordered::new();

        for chunk in chunks {
            let part_number = chunk.id;
            let semaphore = semaphore.clone();
            let executor = executor.clone();
            let coordinator = coordinator.clone();
            let session = session.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::Task {
                        part_number,
                        message: e.to_string(),
                    })?;
                let part = executor.execute(chunk).await?;
                coordinator.upload_part(&session, part).await
            });
            tasks.push(async move { (part_number, handle.await) });
        }

        let mut uploaded = Vec::with_capacity(tasks.len());
        let mut first_failure: Option<(u32, JobError)> = None;
        while let Some((part_number, joined)) = tasks.next().await {
            let error = match joined {
                Ok(Ok(part)) => {
                    uploaded.push(part);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_err) => JobError::Task {
                    part_number,
                    message: join_err.to_string(),
                },
            };
            tracing::error!(part_number, error = %error, "chunk failed");
            if first_failure
                .as_ref()
                .is_none_or(|(failed, _)| part_number < *failed)
            {
                first_failure = Some((part_number, error));
            }
        }

        match first_failure {
            Some((_, error)) => Err(error),
            None => Ok(uploaded),
        }
    }

    /// Count the lines of the finished object; there must be one per record
    /// plus the header.
    async fn verify(&self, total_records: u64) -> Result<()> {
        let mut stream = self.store.get_stream(&self.config.output_key).await?;
        let mut lines = 0u64;
        while let Some(chunk) = stream.next().await {
            lines += chunk?.iter().filter(|&&b| b == b'\n').count() as u64;
        }

        let expected = total_records + 1;
        if lines != expected {
            return Err(JobError::Verification {
                expected,
                actual: lines,
            });
        }
        tracing::info!(lines, "output verified");
        Ok(())
    }
}

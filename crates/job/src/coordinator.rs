//! Multipart upload session management.
//!
//! A session is opened once per job. Parts are uploaded concurrently and
//! recorded as storage acknowledges them; `finalize` completes the upload only
//! after storage's own part listing matches the planned `1..=N` set and the
//! tags recorded here. Non-final parts smaller than the backend's minimum
//! are refused before they are sent, since storage would only reject them at
//! completion.

use crate::error::{JobError, Result};
use rechunk_core::ExecutedPart;
use rechunk_storage::{ObjectStore, PartInfo};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A part acknowledged by storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: u32,
    pub e_tag: String,
    pub record_count: u64,
    pub size: u64,
}

/// An open multipart upload and the parts acknowledged under it.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: String,
    key: String,
    expected_parts: u32,
    parts: Mutex<BTreeMap<u32, UploadedPart>>,
}

impl UploadSession {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of parts the upload is planned to hold.
    pub fn expected_parts(&self) -> u32 {
        self.expected_parts
    }

    /// Acknowledged parts in part-number order.
    pub fn parts(&self) -> Vec<UploadedPart> {
        self.parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn record(&self, part: UploadedPart) {
        self.parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(part.part_number, part);
    }
}

/// Drives one multipart upload to the output key.
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Open the multipart upload for `expected_parts` parts.
    pub async fn begin_session(&self, expected_parts: u32) -> Result<UploadSession> {
        let upload_id = self.store.create_multipart(&self.key).await?;
        tracing::info!(
            key = %self.key,
            upload_id = %upload_id,
            expected_parts,
            "multipart upload opened"
        );
        Ok(UploadSession {
            upload_id,
            key: self.key.clone(),
            expected_parts,
            parts: Mutex::new(BTreeMap::new()),
        })
    }

    /// Upload one executed chunk as its numbered part.
    pub async fn upload_part(
        &self,
        session: &UploadSession,
        part: ExecutedPart,
    ) -> Result<UploadedPart> {
        let part_number = part.part_number;
        let size = part.payload.len() as u64;
        check_part_size(
            part_number,
            size,
            session.expected_parts,
            self.store.min_part_size(),
            self.store.backend_name(),
        )?;

        let e_tag = self
            .store
            .upload_part(&session.key, &session.upload_id, part_number, part.payload)
            .await
            .map_err(|source| JobError::Upload {
                part_number,
                source,
            })?;

        tracing::debug!(part_number, size, records = part.record_count, "part uploaded");
        let uploaded = UploadedPart {
            part_number,
            e_tag,
            record_count: part.record_count,
            size,
        };
        session.record(uploaded.clone());
        Ok(uploaded)
    }

    /// Reconcile storage's part listing with the plan, then complete.
    ///
    /// Returns the part list the upload was completed with.
    pub async fn finalize(&self, session: &UploadSession) -> Result<Vec<PartInfo>> {
        let mut listed = self
            .store
            .list_parts(&session.key, &session.upload_id)
            .await
            .map_err(JobError::Finalize)?;
        listed.sort_by_key(|p| p.part_number);

        reconcile(&listed, &session.parts(), session.expected_parts)?;

        self.store
            .complete_multipart(&session.key, &session.upload_id, &listed)
            .await
            .map_err(JobError::Finalize)?;

        tracing::info!(
            key = %session.key,
            upload_id = %session.upload_id,
            parts = listed.len(),
            "multipart upload completed"
        );
        Ok(listed)
    }

    /// Abandon the upload. Failures are logged, not returned.
    pub async fn abort(&self, session: &UploadSession) {
        if let Err(e) = self
            .store
            .abort_multipart(&session.key, &session.upload_id)
            .await
        {
            tracing::warn!(
                upload_id = %session.upload_id,
                error = %e,
                "Failed to abort multipart upload, orphaned parts may remain"
            );
        } else {
            tracing::info!(upload_id = %session.upload_id, "multipart upload aborted");
        }
    }
}

/// Refuse a non-final part below `minimum` bytes. The last part may be any
/// size.
fn check_part_size(
    part_number: u32,
    size: u64,
    expected_parts: u32,
    minimum: u64,
    backend: &'static str,
) -> Result<()> {
    if part_number < expected_parts && size < minimum {
        return Err(JobError::PartTooSmall {
            part_number,
            size,
            minimum,
            backend,
        });
    }
    Ok(())
}

/// Check that `listed` is exactly parts `1..=expected` and that each tag
/// matches the one storage returned when the part was uploaded.
fn reconcile(listed: &[PartInfo], recorded: &[UploadedPart], expected: u32) -> Result<()> {
    if listed.len() != expected as usize {
        return Err(JobError::Reconciliation(format!(
            "storage lists {} parts, expected {expected}",
            listed.len()
        )));
    }

    let recorded: BTreeMap<u32, &str> = recorded
        .iter()
        .map(|p| (p.part_number, p.e_tag.as_str()))
        .collect();

    for (want, part) in (1..=expected).zip(listed) {
        if part.part_number != want {
            return Err(JobError::Reconciliation(format!(
                "expected part {want}, storage lists part {}",
                part.part_number
            )));
        }
        match recorded.get(&want) {
            Some(tag) if *tag == part.e_tag => {}
            Some(tag) => {
                return Err(JobError::Reconciliation(format!(
                    "part {want} has tag {} in storage but {tag} was acknowledged",
                    part.e_tag
                )));
            }
            None => {
                return Err(JobError::Reconciliation(format!(
                    "part {want} is in storage but was never acknowledged"
                )));
            }
        }
    }

    Ok(())
}

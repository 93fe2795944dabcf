use async_trait::async_trait;
use bytes::Bytes;
use rechunk_storage::{ByteStream, ObjectMeta, ObjectStore, PartInfo, StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

struct Upload {
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// Failures the store should produce on demand.
#[derive(Default)]
#[allow(dead_code)]
pub struct Faults {
    /// Fail `get_range` calls starting at one of these offsets.
    pub range_starts: HashSet<u64>,
    /// Fail `upload_part` for these part numbers.
    pub upload_parts: HashSet<u32>,
    /// Leave these part numbers out of `list_parts`.
    pub hidden_parts: HashSet<u32>,
    /// Report a different tag for these part numbers in `list_parts`.
    pub retagged_parts: HashSet<u32>,
    /// Truncate every non-empty range read by this many bytes.
    pub truncate_ranges_by: usize,
    /// Make `abort_multipart` fail.
    pub abort: bool,
    /// Extra bytes appended to the object on completion.
    pub append_on_complete: Option<Bytes>,
}

/// In-memory object store with multipart support, call counters and fault
/// injection.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    uploads: Mutex<HashMap<String, Upload>>,
    pub faults: Mutex<Faults>,
    /// Sleep inside `get_range` so overlapping reads can be observed.
    pub range_delay: Option<Duration>,
    /// Reported as the backend's minimum non-final part size.
    pub min_part_size: u64,
    next_upload: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub range_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub abort_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range_delay(delay: Duration) -> Self {
        Self {
            range_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_min_part_size(min_part_size: u64) -> Self {
        Self {
            min_part_size,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.into());
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn open_uploads(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn tag(data: &[u8]) -> String {
        Sha256::digest(data)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: data.len() as u64,
        })
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StorageResult<Bytes> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.range_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (fail, truncate) = {
            let faults = self.faults.lock().unwrap();
            (
                faults.range_starts.contains(&start),
                faults.truncate_ranges_by,
            )
        };
        if fail {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("injected read failure at {start}"),
            )));
        }

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let start = (start as usize).min(data.len());
        let end = (end as usize).min(data.len());
        let end = end.saturating_sub(truncate).max(start);
        Ok(data.slice(start..end))
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        // Small pieces so line counting spans chunk boundaries.
        let pieces: Vec<StorageResult<Bytes>> = data
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(pieces)))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.insert(key, data);
        Ok(())
    }

    async fn create_multipart(&self, key: &str) -> StorageResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let upload_id = format!(
            "upload-{}",
            self.next_upload.fetch_add(1, Ordering::SeqCst)
        );
        self.uploads.lock().unwrap().insert(
            upload_id.clone(),
            Upload {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<String> {
        if self
            .faults
            .lock()
            .unwrap()
            .upload_parts
            .contains(&part_number)
        {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected upload failure for part {part_number}"
            ))));
        }

        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;
        let tag = Self::tag(&data);
        upload.parts.insert(part_number, (tag.clone(), data));
        Ok(tag)
    }

    async fn list_parts(&self, key: &str, upload_id: &str) -> StorageResult<Vec<PartInfo>> {
        let faults = self.faults.lock().unwrap();
        let uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;

        Ok(upload
            .parts
            .iter()
            .filter(|(n, _)| !faults.hidden_parts.contains(n))
            .map(|(n, (tag, data))| PartInfo {
                part_number: *n,
                e_tag: if faults.retagged_parts.contains(n) {
                    format!("{tag}-stale")
                } else {
                    tag.clone()
                },
                size: data.len() as u64,
            })
            .collect())
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartInfo],
    ) -> StorageResult<()> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let upload = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;

        let mut out = Vec::new();
        for part in parts {
            let (tag, data) = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StorageError::InvalidPart(part.part_number.to_string()))?;
            if *tag != part.e_tag {
                return Err(StorageError::InvalidPart(part.part_number.to_string()));
            }
            out.extend_from_slice(data);
        }
        if let Some(extra) = &self.faults.lock().unwrap().append_on_complete {
            out.extend_from_slice(extra);
        }
        self.insert(key, out);
        Ok(())
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> StorageResult<()> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.lock().unwrap().abort {
            return Err(StorageError::Io(std::io::Error::other(
                "injected abort failure",
            )));
        }
        self.uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))
    }

    fn min_part_size(&self) -> u64 {
        self.min_part_size
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

//! Local filesystem storage backend.
//!
//! Multipart uploads are staged under `<root>/.multipart/<upload-id>/`. Each
//! part is written atomically next to a sidecar holding its SHA-256 tag, and
//! completion concatenates the requested parts into a temp file that is
//! renamed over the destination key.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectMeta, ObjectStore, PartInfo};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Maximum range size for get_range operations (512 MiB).
const MAX_RANGE_SIZE: u64 = 512 * 1024 * 1024;

/// Directory under the root reserved for multipart staging.
const STAGING_DIR: &str = ".multipart";

/// File inside an upload's staging directory naming its destination key.
const TARGET_FILE: &str = "target";

/// Highest part number a multipart upload accepts.
const MAX_PART_NUMBER: u32 = 10_000;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

fn not_found_or_io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

fn part_file_name(part_number: u32) -> String {
    format!("part-{part_number:05}")
}

fn parse_part_file_name(name: &str) -> Option<u32> {
    name.strip_prefix("part-")
        .filter(|rest| rest.len() == 5 && rest.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|rest| rest.parse().ok())
}

fn hex_sha256(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Temp sibling of `path` used for atomic replacement.
fn temp_sibling(path: &Path) -> PathBuf {
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    )
}

async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let temp_path = temp_sibling(path);
    {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
    }
    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Concatenate staged parts into `out_path`, checking order and tags.
async fn assemble_parts(staging: &Path, parts: &[PartInfo], out_path: &Path) -> StorageResult<()> {
    let mut out = fs::File::create(out_path).await?;
    let mut previous = 0;
    for part in parts {
        if part.part_number <= previous {
            return Err(StorageError::InvalidPart(format!(
                "part {} is out of order",
                part.part_number
            )));
        }
        previous = part.part_number;

        let part_path = staging.join(part_file_name(part.part_number));
        let stored_tag = match fs::read_to_string(part_path.with_extension("etag")).await {
            Ok(tag) => tag,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::InvalidPart(format!(
                    "part {} was never uploaded",
                    part.part_number
                )));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        if stored_tag != part.e_tag {
            return Err(StorageError::InvalidPart(format!(
                "part {} tag {} does not match stored {}",
                part.part_number, part.e_tag, stored_tag
            )));
        }

        let mut input = fs::File::open(&part_path).await?;
        tokio::io::copy(&mut input, &mut out).await?;
    }
    out.sync_all().await?;
    Ok(())
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Canonicalization and symlink checks touch the disk, so they run on the
    /// blocking pool.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Resolve `key` under `root`, rejecting anything that could land outside
    /// it or inside the staging area.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!("not a relative key: {key:?}")));
        }

        if key.split(['/', '\\']).next() == Some(STAGING_DIR) {
            return Err(StorageError::InvalidKey(format!(
                "key uses reserved prefix {STAGING_DIR}: {key}"
            )));
        }
        if Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }

        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        // The nearest existing path (the key itself or an ancestor) must
        // resolve inside the root; a symlinked directory cannot redirect writes.
        let path = root.join(key);
        let mut probe = path.as_path();
        loop {
            match std::fs::symlink_metadata(probe) {
                Ok(meta) => {
                    let canonical = probe.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(e)
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StorageError::Io(err)),
            }
            match probe.parent() {
                Some(parent) => probe = parent,
                None => return Ok(path),
            }
        }
    }

    /// Staging directory for an upload id, which must be a UUID.
    fn staging_path(&self, upload_id: &str) -> StorageResult<PathBuf> {
        let id = Uuid::parse_str(upload_id)
            .map_err(|_| StorageError::NoSuchUpload(upload_id.to_string()))?;
        Ok(self.root.join(STAGING_DIR).join(id.to_string()))
    }

    /// Staging directory for an existing upload opened for `key`.
    async fn open_upload(&self, key: &str, upload_id: &str) -> StorageResult<PathBuf> {
        let staging = self.staging_path(upload_id)?;
        let target = match fs::read_to_string(staging.join(TARGET_FILE)).await {
            Ok(target) => target,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NoSuchUpload(upload_id.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        if target != key {
            return Err(StorageError::NoSuchUpload(format!(
                "{upload_id} was opened for {target}, not {key}"
            )));
        }
        Ok(staging)
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key).await?;
        let metadata = fs::metadata(&path).await.map_err(not_found_or_io(key))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(ObjectMeta {
            size: metadata.len(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_range(&self, key: &str, start: u64, end: u64) -> StorageResult<Bytes> {
        use tokio::io::AsyncSeekExt;

        if end < start {
            return Err(StorageError::InvalidRange(format!(
                "end ({end}) < start ({start})"
            )));
        }
        let range_size = end - start;
        if range_size > MAX_RANGE_SIZE {
            return Err(StorageError::InvalidRange(format!(
                "range size {range_size} exceeds maximum {MAX_RANGE_SIZE} bytes"
            )));
        }
        let len = usize::try_from(range_size).map_err(|_| {
            StorageError::InvalidRange(format!(
                "range size {range_size} exceeds platform address space"
            ))
        })?;

        let path = self.key_path(key).await?;
        let mut file = fs::File::open(&path).await.map_err(not_found_or_io(key))?;
        file.seek(std::io::SeekFrom::Start(start)).await?;

        // Past EOF the read just stops short.
        let mut buf = Vec::with_capacity(len);
        file.take(range_size).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_path(key).await?;
        let file = fs::File::open(&path).await.map_err(not_found_or_io(key))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        self.ensure_parent(&path).await?;
        write_atomic(&path, &data).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn create_multipart(&self, key: &str) -> StorageResult<String> {
        self.key_path(key).await?;
        let upload_id = Uuid::new_v4().to_string();
        let staging = self.staging_path(&upload_id)?;
        fs::create_dir_all(&staging).await?;
        write_atomic(&staging.join(TARGET_FILE), key.as_bytes()).await?;
        tracing::debug!(upload_id = %upload_id, "opened multipart upload");
        Ok(upload_id)
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<String> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(StorageError::InvalidPart(format!(
                "part number {part_number} outside 1..={MAX_PART_NUMBER}"
            )));
        }
        let staging = self.open_upload(key, upload_id).await?;
        let part_path = staging.join(part_file_name(part_number));
        let e_tag = hex_sha256(&data);

        // Tag first: a listed part always has a tag that matches its bytes
        // once both renames land.
        write_atomic(&part_path.with_extension("etag"), e_tag.as_bytes()).await?;
        write_atomic(&part_path, &data).await?;
        Ok(e_tag)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list_parts(&self, key: &str, upload_id: &str) -> StorageResult<Vec<PartInfo>> {
        let staging = self.open_upload(key, upload_id).await?;
        let mut parts = Vec::new();

        let mut entries = fs::read_dir(&staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(part_number) = name.to_str().and_then(parse_part_file_name) else {
                continue;
            };
            let path = entry.path();
            let e_tag = fs::read_to_string(path.with_extension("etag")).await?;
            let size = entry.metadata().await?.len();
            parts.push(PartInfo {
                part_number,
                e_tag,
                size,
            });
        }

        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    #[instrument(skip(self, parts), fields(backend = "filesystem", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartInfo],
    ) -> StorageResult<()> {
        let staging = self.open_upload(key, upload_id).await?;
        if parts.is_empty() {
            return Err(StorageError::InvalidPart(
                "a multipart upload needs at least one part".to_string(),
            ));
        }

        let path = self.key_path(key).await?;
        self.ensure_parent(&path).await?;
        let temp_path = temp_sibling(&path);

        let assembled = assemble_parts(&staging, parts, &temp_path).await;

        if let Err(e) = assembled {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "failed to remove partial multipart output"
                );
            }
            return Err(e);
        }

        fs::rename(&temp_path, &path).await?;
        fs::remove_dir_all(&staging).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let staging = self.open_upload(key, upload_id).await?;
        fs::remove_dir_all(&staging).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

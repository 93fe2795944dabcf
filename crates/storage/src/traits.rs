//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
}

/// A part recorded under a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartInfo {
    /// 1-based part number.
    pub part_number: u32,
    /// Integrity tag returned when the part was uploaded.
    pub e_tag: String,
    /// Part size in bytes.
    pub size: u64,
}

/// Object store abstraction: ranged reads plus multipart writes.
///
/// Every key is relative to the bucket (or root directory) the backend was
/// constructed for.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get the half-open byte range `[start, end)` of an object.
    ///
    /// A range extending past the end of the object returns the bytes that
    /// exist; callers that need an exact length must check it.
    async fn get_range(&self, key: &str, start: u64, end: u64) -> StorageResult<Bytes>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object atomically.
    ///
    /// Jobs write through multipart uploads; this is for seeding inputs and
    /// administrative copies.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Open a multipart upload for `key` and return its upload id.
    async fn create_multipart(&self, key: &str) -> StorageResult<String>;

    /// Upload one part and return its integrity tag.
    ///
    /// Uploading the same part number twice replaces the earlier part.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<String>;

    /// List every part recorded for an upload, sorted by part number.
    async fn list_parts(&self, key: &str, upload_id: &str) -> StorageResult<Vec<PartInfo>>;

    /// Assemble `parts`, in the given order, into the object at `key`.
    ///
    /// The object becomes visible only once this returns successfully.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartInfo],
    ) -> StorageResult<()>;

    /// Abandon an upload and discard its parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Smallest payload accepted for any part but the last of a multipart
    /// upload. Zero means no minimum.
    fn min_part_size(&self) -> u64 {
        0
    }

    /// Get the name of this storage backend (e.g. "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

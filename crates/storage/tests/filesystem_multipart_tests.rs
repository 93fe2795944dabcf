mod common;

use bytes::Bytes;
use common::{seeded_bytes, sha256_hash};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use rechunk_storage::{FilesystemBackend, ObjectStore, StorageError};
use std::sync::Arc;
use tempfile::TempDir;

async fn backend() -> (TempDir, Arc<FilesystemBackend>) {
    let temp_dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(temp_dir.path()).await.unwrap();
    (temp_dir, Arc::new(backend))
}

async fn read_all(store: &dyn ObjectStore, key: &str) -> Vec<u8> {
    let mut stream = store.get_stream(key).await.unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn test_concurrent_part_uploads_assemble_in_part_order() {
    let (_temp, backend) = backend().await;
    let key = "out/result.csv";
    let upload_id = backend.create_multipart(key).await.unwrap();

    let parts: Vec<Bytes> = (0..16u64)
        .map(|i| seeded_bytes(i, 1000 + i as usize * 37))
        .collect();

    let mut uploads = FuturesUnordered::new();
    for (index, data) in parts.iter().enumerate().rev() {
        let backend = backend.clone();
        let upload_id = upload_id.clone();
        let data = data.clone();
        uploads.push(tokio::spawn(async move {
            let number = index as u32 + 1;
            let tag = backend
                .upload_part(key, &upload_id, number, data)
                .await
                .unwrap();
            (number, tag)
        }));
    }
    let mut tags = Vec::new();
    while let Some(joined) = uploads.next().await {
        tags.push(joined.unwrap());
    }
    tags.sort();

    let listed = backend.list_parts(key, &upload_id).await.unwrap();
    assert_eq!(listed.len(), parts.len());
    for ((info, (number, tag)), data) in listed.iter().zip(&tags).zip(&parts) {
        assert_eq!(info.part_number, *number);
        assert_eq!(&info.e_tag, tag);
        assert_eq!(info.e_tag, sha256_hash(data));
        assert_eq!(info.size, data.len() as u64);
    }

    backend
        .complete_multipart(key, &upload_id, &listed)
        .await
        .unwrap();

    let expected: Vec<u8> = parts.iter().flat_map(|p| p.iter().copied()).collect();
    assert_eq!(read_all(backend.as_ref(), key).await, expected);
    assert_eq!(
        backend.head(key).await.unwrap().size,
        expected.len() as u64
    );
}

#[tokio::test]
async fn test_complete_replaces_existing_object() {
    let (_temp, backend) = backend().await;
    backend
        .put("out", Bytes::from_static(b"stale contents"))
        .await
        .unwrap();

    let upload_id = backend.create_multipart("out").await.unwrap();
    backend
        .upload_part("out", &upload_id, 1, Bytes::from_static(b"fresh"))
        .await
        .unwrap();
    let parts = backend.list_parts("out", &upload_id).await.unwrap();
    backend
        .complete_multipart("out", &upload_id, &parts)
        .await
        .unwrap();

    assert_eq!(read_all(backend.as_ref(), "out").await, b"fresh");
}

#[tokio::test]
async fn test_failed_complete_leaves_existing_object() {
    let (_temp, backend) = backend().await;
    backend
        .put("out", Bytes::from_static(b"previous"))
        .await
        .unwrap();

    let upload_id = backend.create_multipart("out").await.unwrap();
    backend
        .upload_part("out", &upload_id, 1, Bytes::from_static(b"a"))
        .await
        .unwrap();
    let mut parts = backend.list_parts("out", &upload_id).await.unwrap();
    parts.push(rechunk_storage::PartInfo {
        part_number: 2,
        e_tag: "missing".to_string(),
        size: 1,
    });

    let err = backend
        .complete_multipart("out", &upload_id, &parts)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidPart(_)));
    assert_eq!(read_all(backend.as_ref(), "out").await, b"previous");

    // The upload is still open and can be aborted.
    backend.abort_multipart("out", &upload_id).await.unwrap();
}

#[tokio::test]
async fn test_independent_uploads_do_not_interfere() {
    let (_temp, backend) = backend().await;
    let first = backend.create_multipart("a").await.unwrap();
    let second = backend.create_multipart("b").await.unwrap();
    assert_ne!(first, second);

    backend
        .upload_part("a", &first, 1, Bytes::from_static(b"first"))
        .await
        .unwrap();
    backend
        .upload_part("b", &second, 1, Bytes::from_static(b"second"))
        .await
        .unwrap();
    backend.abort_multipart("b", &second).await.unwrap();

    let parts = backend.list_parts("a", &first).await.unwrap();
    backend.complete_multipart("a", &first, &parts).await.unwrap();
    assert_eq!(read_all(backend.as_ref(), "a").await, b"first");
    assert!(matches!(
        backend.head("b").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_range_reads_cover_object_exactly() {
    let (_temp, backend) = backend().await;
    let data = seeded_bytes(7, 10_000);
    backend.put("in", data.clone()).await.unwrap();

    let mut rebuilt = Vec::new();
    let mut start = 0u64;
    while start < data.len() as u64 {
        let end = (start + 777).min(data.len() as u64);
        rebuilt.extend_from_slice(&backend.get_range("in", start, end).await.unwrap());
        start = end;
    }
    assert_eq!(rebuilt, data.to_vec());
}

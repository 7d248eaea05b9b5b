//! In-memory storage backend for tests and local dry runs.
//!
//! Behaves like the real thing where the pipeline can tell the difference:
//! uploads to a missing bucket fail, objects over the bucket's size cap are
//! rejected, creating an existing bucket is a no-op, and creation attempts
//! are counted so tests can assert the lazy-creation contract.

use super::{BucketSpec, ContentStore, ObjectStore};
use crate::error::{IngestError, PersistStage};
use crate::record::ContentRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct Bucket {
    spec: BucketSpec,
    objects: HashMap<String, Vec<u8>>,
}

/// In-memory [`ObjectStore`] + [`ContentStore`].
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, Bucket>>,
    records: Mutex<Vec<ContentRecord>>,
    create_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `create_bucket` has been called (no-ops included).
    pub fn bucket_create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of saved records.
    pub fn records(&self) -> Vec<ContentRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Bytes of a stored object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Keys currently stored in a bucket.
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, name: &str) -> Result<bool, IngestError> {
        Ok(self.buckets.lock().unwrap().contains_key(name))
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<(), IngestError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut buckets = self.buckets.lock().unwrap();
        // Existing bucket: benign no-op, per the ObjectStore contract.
        buckets.entry(spec.name.clone()).or_insert_with(|| Bucket {
            spec: spec.clone(),
            objects: HashMap::new(),
        });
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), IngestError> {
        let mut buckets = self.buckets.lock().unwrap();
        let b = buckets.get_mut(bucket).ok_or_else(|| IngestError::PersistFailed {
            stage: PersistStage::Upload,
            detail: format!("bucket '{bucket}' does not exist"),
        })?;
        if bytes.len() as u64 > b.spec.max_object_bytes {
            return Err(IngestError::PersistFailed {
                stage: PersistStage::Upload,
                detail: format!(
                    "object is {} bytes, bucket cap is {}",
                    bytes.len(),
                    b.spec.max_object_bytes
                ),
            });
        }
        b.objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert(&self, record: &ContentRecord) -> Result<ContentRecord, IngestError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(record.clone())
    }
}

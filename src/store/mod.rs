//! Storage collaborators: object storage and the content-record store.
//!
//! Both are traits so the pipeline can be exercised without a network:
//! production uses the Supabase backend ([`supabase::SupabaseStore`],
//! which implements both), tests and local runs use [`memory::MemoryStore`].
//!
//! ## Required idempotency
//!
//! Bucket creation must be safe under concurrent first-use: two sessions
//! may both observe "bucket absent" and both call `create_bucket`.
//! Implementations must treat creation of an already-existing bucket as a
//! benign no-op (or a conflict that is safely ignored). This is a property
//! of the backend, not an internal lock.

pub mod memory;
pub mod supabase;

use crate::error::IngestError;
use crate::record::ContentRecord;
use async_trait::async_trait;

/// Parameters for lazy bucket creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    pub name: String,
    /// Objects are publicly readable (the record stores a public URL).
    pub public: bool,
    /// Maximum object size in bytes.
    pub max_object_bytes: u64,
}

impl BucketSpec {
    /// Spec for the screenshot bucket: public-read, 5 MiB cap.
    pub fn for_bucket(name: impl Into<String>) -> Self {
        BucketSpec {
            name: name.into(),
            public: true,
            max_object_bytes: crate::config::MAX_OBJECT_BYTES,
        }
    }
}

/// A named container of uploaded images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether the bucket already exists.
    async fn bucket_exists(&self, name: &str) -> Result<bool, IngestError>;

    /// Create the bucket. Creating an existing bucket must be a no-op.
    async fn create_bucket(&self, spec: &BucketSpec) -> Result<(), IngestError>;

    /// Upload an object under `key` with the given content type.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), IngestError>;

    /// Publicly resolvable URL for an object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Insert-only store for content records. Update/delete are deliberately
/// absent — this pipeline never mutates saved records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert one record, returning it as stored.
    async fn insert(&self, record: &ContentRecord) -> Result<ContentRecord, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_spec_defaults() {
        let spec = BucketSpec::for_bucket("content-images");
        assert!(spec.public);
        assert_eq!(spec.max_object_bytes, 5 * 1024 * 1024);
    }
}

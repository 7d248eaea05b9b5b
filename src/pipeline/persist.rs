//! Record persistence: bucket ensure → upload → public URL → row insert.
//!
//! Ordering matters: the image must be durably stored and publicly
//! addressable *before* the record referencing it exists, so no record ever
//! points at a missing object. The converse orphan — an uploaded object
//! whose insert then failed — is acceptable (cleanup is out of scope) but
//! the save is still reported failed.
//!
//! Bucket creation is lazy and at-least-once: the first save checks and
//! creates; callers (the `Ingestor`) memoize success so later saves skip
//! the check entirely. Races between processes are resolved by the
//! [`ObjectStore`] contract, under which creating an existing bucket is a
//! benign no-op.

use crate::error::IngestError;
use crate::pipeline::intake::sanitize_filename;
use crate::record::{ContentRecord, ExtractionResult, StagedImage};
use crate::store::{BucketSpec, ContentStore, ObjectStore};
use chrono::Utc;
use tracing::{debug, info};

/// Ensure the bucket exists, creating it on first use.
pub async fn ensure_bucket(objects: &dyn ObjectStore, spec: &BucketSpec) -> Result<(), IngestError> {
    if objects.bucket_exists(&spec.name).await? {
        debug!(bucket = %spec.name, "bucket present");
        return Ok(());
    }
    objects.create_bucket(spec).await
}

/// Collision-resistant object key: millisecond timestamp plus the
/// sanitized original filename.
pub fn object_key(image: &StagedImage, now_millis: i64) -> String {
    format!("{now_millis}-{}", sanitize_filename(&image.filename))
}

/// Persist a confirmed extraction: upload the original image and insert one
/// content record referencing its public URL.
///
/// The bucket must already exist (see [`ensure_bucket`]); the `Ingestor`
/// guarantees that ordering.
pub async fn persist(
    objects: &dyn ObjectStore,
    records: &dyn ContentStore,
    bucket: &str,
    image: &StagedImage,
    extraction: &ExtractionResult,
    original_post_url: Option<String>,
) -> Result<ContentRecord, IngestError> {
    let now = Utc::now();
    let key = object_key(image, now.timestamp_millis());

    objects
        .upload(bucket, &key, &image.bytes, &image.mime)
        .await?;
    let image_url = objects.public_url(bucket, &key);
    debug!(%image_url, "image uploaded");

    let record = ContentRecord::from_extraction(extraction, image_url, original_post_url, now);
    let stored = records.insert(&record).await?;
    info!(title = %stored.title, "content record saved");
    Ok(stored)
}

//! Supabase-backed storage: the hosted object store and record table the
//! original dashboard writes to.
//!
//! Two REST surfaces behind one client:
//!
//! * **Storage API** (`/storage/v1/…`) — bucket existence/creation, object
//!   upload, public URL resolution.
//! * **PostgREST** (`/rest/v1/content_items`) — the insert-one operation
//!   for content records.
//!
//! Authentication is the service key, sent as both `apikey` and bearer
//! token. Bucket creation racing another session is resolved by treating
//! the conflict response as success — Supabase reports an existing bucket
//! with a 4xx "already exists" body, which satisfies the [`ObjectStore`]
//! idempotency contract without any locking here.

use super::{BucketSpec, ContentStore, ObjectStore};
use crate::error::{IngestError, PersistStage};
use crate::record::ContentRecord;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Table holding captured content records.
const CONTENT_TABLE: &str = "content_items";

/// Client for a Supabase project's storage and record table.
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStore {
    /// Build a client for the project at `base_url` (no trailing slash)
    /// using its service key.
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let service_key = service_key.into();
        if base_url.is_empty() || service_key.is_empty() {
            return Err(IngestError::InvalidConfig(
                "Supabase URL and service key must both be set".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IngestError::Internal(format!("http client: {e}")))?;
        Ok(SupabaseStore {
            client,
            base_url,
            service_key,
        })
    }

    /// Build a client from `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`.
    pub fn from_env() -> Result<Self, IngestError> {
        let url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let key = std::env::var("SUPABASE_SERVICE_KEY").unwrap_or_default();
        if url.is_empty() || key.is_empty() {
            return Err(IngestError::InvalidConfig(
                "Set SUPABASE_URL and SUPABASE_SERVICE_KEY in the environment.".into(),
            ));
        }
        Self::new(url, key)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn persist_err(stage: PersistStage, detail: impl Into<String>) -> IngestError {
        IngestError::PersistFailed {
            stage,
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn bucket_exists(&self, name: &str) -> Result<bool, IngestError> {
        let url = format!("{}/storage/v1/bucket/{name}", self.base_url);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| Self::persist_err(PersistStage::Bucket, e.to_string()))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(Self::persist_err(
                    PersistStage::Bucket,
                    format!("existence check returned HTTP {s}: {body}"),
                ))
            }
        }
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<(), IngestError> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let body = json!({
            "id": spec.name,
            "name": spec.name,
            "public": spec.public,
            "file_size_limit": spec.max_object_bytes,
        });
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::persist_err(PersistStage::Bucket, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(bucket = %spec.name, "bucket created");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        // Lost the creation race (or the bucket predates us): fine either way.
        if status == reqwest::StatusCode::CONFLICT || text.contains("already exists") {
            debug!(bucket = %spec.name, "bucket already exists");
            return Ok(());
        }
        Err(Self::persist_err(
            PersistStage::Bucket,
            format!("creation returned HTTP {status}: {text}"),
        ))
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), IngestError> {
        let url = format!("{}/storage/v1/object/{bucket}/{key}", self.base_url);
        let response = self
            .request(reqwest::Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Self::persist_err(PersistStage::Upload, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::persist_err(
                PersistStage::Upload,
                format!("HTTP {status}: {body}"),
            ));
        }
        debug!(bucket, key, bytes = bytes.len(), "object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{key}", self.base_url)
    }
}

#[async_trait]
impl ContentStore for SupabaseStore {
    async fn insert(&self, record: &ContentRecord) -> Result<ContentRecord, IngestError> {
        let url = format!("{}/rest/v1/{CONTENT_TABLE}", self.base_url);
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .map_err(|e| Self::persist_err(PersistStage::Insert, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::persist_err(
                PersistStage::Insert,
                format!("HTTP {status}: {body}"),
            ));
        }

        // PostgREST returns the inserted rows as an array.
        let mut rows: Vec<ContentRecord> = response
            .json()
            .await
            .map_err(|e| Self::persist_err(PersistStage::Insert, format!("bad response: {e}")))?;
        rows.pop()
            .ok_or_else(|| Self::persist_err(PersistStage::Insert, "insert returned no rows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_shape() {
        let store = SupabaseStore::new("https://proj.supabase.co/", "key").unwrap();
        assert_eq!(
            store.public_url("content-images", "123-shot.png"),
            "https://proj.supabase.co/storage/v1/object/public/content-images/123-shot.png"
        );
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(SupabaseStore::new("", "key").is_err());
        assert!(SupabaseStore::new("https://x", "").is_err());
    }
}

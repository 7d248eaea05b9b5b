//! End-to-end pipeline tests with a stubbed vision provider and the
//! in-memory storage backend. No network, no API keys.

use async_trait::async_trait;
use snap2post::store::memory::MemoryStore;
use snap2post::{
    ExtractionRequest, FileUpload, IngestConfig, IngestError, Ingestor, SessionState,
    UploadSession, VisionProvider,
};
use std::sync::Arc;
use std::sync::Mutex;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Provider returning a canned completion and recording what it was sent.
struct StubVision {
    completion: String,
    seen: Mutex<Vec<ExtractionRequest>>,
}

impl StubVision {
    fn new(completion: impl Into<String>) -> Arc<Self> {
        Arc::new(StubVision {
            completion: completion.into(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionProvider for StubVision {
    async fn complete(&self, request: &ExtractionRequest) -> Result<String, IngestError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(self.completion.clone())
    }
}

/// A small real JPEG (about 2 KB) produced by the `image` crate.
fn small_jpeg() -> Vec<u8> {
    use image::{ImageBuffer, Rgb};
    let img = ImageBuffer::from_fn(64, 64, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .expect("jpeg encode");
    bytes
}

fn ingestor(provider: Arc<StubVision>) -> (Ingestor, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = IngestConfig::builder()
        .provider(provider)
        .build()
        .expect("valid config");
    let ing = Ingestor::from_config(config, store.clone(), store.clone()).expect("ingestor");
    (ing, store)
}

fn staged_session(bytes: Vec<u8>) -> UploadSession {
    let mut session = UploadSession::new();
    session
        .accept(FileUpload {
            filename: "brunch shot.jpg".into(),
            mime: "image/jpeg".into(),
            bytes,
        })
        .expect("jpeg accepted");
    session
}

// ── Scenario A: fenced completion with a numeric-string likes field ──────────

#[tokio::test]
async fn scenario_a_fenced_completion_normalizes() {
    let provider = StubVision::new(
        "```json\n{\"caption\":\"Great night!\",\"likes\":\"87\",\"comments\":3,\
         \"username\":\"chef_jane\",\"postedDate\":\"2024-05-01\",\
         \"hashtags\":[\"food\",\"wine\"]}\n```",
    );
    let (ing, _) = ingestor(provider.clone());
    let mut session = staged_session(small_jpeg());

    let extraction = ing.analyze(&mut session).await.expect("analysis succeeds");

    assert_eq!(extraction.caption, "Great night!");
    assert_eq!(extraction.likes, 87);
    assert_eq!(extraction.comments, 3);
    assert_eq!(extraction.username, "chef_jane");
    assert_eq!(extraction.posted_date, "2024-05-01");
    assert_eq!(extraction.hashtags, vec!["food".to_string(), "wine".to_string()]);
    assert_eq!(session.state(), SessionState::Analyzed);

    // The encoder produced a non-empty base64 payload of the JPEG.
    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].image_base64.is_empty());
    assert!(seen[0].data_uri().starts_with("data:image/jpeg;base64,"));
}

// ── Scenario B: prose completion fails without creating a record ─────────────

#[tokio::test]
async fn scenario_b_prose_completion_fails_cleanly() {
    let provider = StubVision::new("Sorry, I cannot process this image.");
    let (ing, store) = ingestor(provider);
    let mut session = staged_session(small_jpeg());

    let err = ing.analyze(&mut session).await.expect_err("must fail");
    assert_eq!(
        err.raw_completion(),
        Some("Sorry, I cannot process this image.")
    );
    assert_eq!(session.state(), SessionState::AnalysisFailed);

    // No record exists for an analyzed-but-failed upload, and a save
    // attempt from this state is rejected.
    assert!(store.records().is_empty());
    assert!(ing.save(&mut session, None).await.is_err());
    assert!(store.records().is_empty());
}

// ── Scenario C: long caption truncates into the record title ─────────────────

#[tokio::test]
async fn scenario_c_long_caption_truncates_title() {
    let caption = "a".repeat(80);
    let provider = StubVision::new(format!("{{\"caption\":\"{caption}\"}}"));
    let (ing, store) = ingestor(provider);
    let mut session = staged_session(small_jpeg());

    ing.analyze(&mut session).await.unwrap();
    let record = ing.save(&mut session, None).await.unwrap();

    assert_eq!(record.title, format!("{}...", "a".repeat(50)));
    assert_eq!(record.content, caption);
    assert_eq!(store.records()[0].title, record.title);
}

// ── Scenario D: bucket is created lazily, exactly once ───────────────────────

#[tokio::test]
async fn scenario_d_bucket_created_once_per_process() {
    let provider = StubVision::new(r#"{"caption":"x","likes":1}"#);
    let (ing, store) = ingestor(provider);

    for _ in 0..2 {
        let mut session = staged_session(small_jpeg());
        ing.analyze(&mut session).await.unwrap();
        ing.save(&mut session, None).await.unwrap();
        assert_eq!(session.state(), SessionState::Saved);
    }

    assert_eq!(store.bucket_create_calls(), 1, "second save must not re-create");
    assert_eq!(store.records().len(), 2);

    // Both uploads landed under timestamped, sanitized keys.
    for key in store.object_keys(snap2post::DEFAULT_BUCKET) {
        assert!(key.ends_with("-brunch_shot.jpg"), "key: {key}");
    }
}

// ── Full record shape after a confirmed save ─────────────────────────────────

#[tokio::test]
async fn saved_record_references_uploaded_object() {
    let provider = StubVision::new(
        r#"{"caption":"Great night!","likes":87,"comments":3,"username":"chef_jane","postedDate":"2024-05-01","hashtags":["food"]}"#,
    );
    let (ing, store) = ingestor(provider);
    let mut session = staged_session(small_jpeg());

    ing.analyze(&mut session).await.unwrap();
    let record = ing
        .save(&mut session, Some("https://instagram.com/p/abc".into()))
        .await
        .unwrap();

    assert_eq!(record.platform, "instagram");
    assert_eq!(record.username, "chef_jane");
    assert_eq!(
        record.original_post_url.as_deref(),
        Some("https://instagram.com/p/abc")
    );
    assert_eq!(record.published_at.to_rfc3339(), "2024-05-01T00:00:00+00:00");

    // The image the record points at is actually stored.
    let key = record
        .image_url
        .rsplit('/')
        .next()
        .expect("key in public url");
    assert_eq!(
        store.object(snap2post::DEFAULT_BUCKET, key).as_deref(),
        Some(small_jpeg().as_slice())
    );
}

// ── Rejection before the pipeline ever runs ──────────────────────────────────

#[tokio::test]
async fn non_image_never_reaches_the_provider() {
    let provider = StubVision::new("{}");
    let (_ing, _) = ingestor(provider.clone());
    let mut session = UploadSession::new();

    let err = session
        .accept(FileUpload {
            filename: "menu.pdf".into(),
            mime: "application/pdf".into(),
            bytes: vec![1, 2, 3],
        })
        .expect_err("pdf rejected");
    assert!(matches!(err, IngestError::InvalidFileType { .. }));
    assert!(provider.seen.lock().unwrap().is_empty());
}

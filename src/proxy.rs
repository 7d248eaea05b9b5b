//! Extraction proxy: the HTTP face of the vision call.
//!
//! Browsers cannot hold the vision API key, so the dashboard posts the
//! base64 screenshot here and this proxy makes the upstream call. The
//! surface is one endpoint plus CORS:
//!
//! * `POST /analyze-instagram-image` with `{"imageBase64": "…"}` →
//!   `{"success": true, "instagramData": {…}}`
//! * `400` — no image in the request
//! * `422` — completion not JSON-recoverable; the body carries
//!   `rawResponse` so the operator can see what the model actually said
//! * `502` — upstream call failed
//! * `500` — proxy misconfiguration (should not happen after startup:
//!   a missing API key fails [`ProxyConfig::from_env`] before binding)
//!
//! CORS is permissive by design (`*` origin; `authorization, x-client-info,
//! apikey, content-type` allowed) — the key never reaches the browser, so
//! the proxy itself carries no secret worth protecting per-origin.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::pipeline::vision::{OpenAiVision, VisionProvider};
use crate::pipeline::normalize;
use crate::record::ExtractionRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Startup configuration for the proxy.
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub ingest: IngestConfig,
    pub api_key: String,
}

impl ProxyConfig {
    /// Read configuration from the environment.
    ///
    /// A missing `OPENAI_API_KEY` fails here, at startup — a misconfigured
    /// proxy must refuse to start rather than fail every request at
    /// runtime.
    pub fn from_env() -> Result<Self, IngestError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            return Err(IngestError::ProviderNotConfigured {
                hint: "Set OPENAI_API_KEY in the proxy environment.".into(),
            });
        }
        let bind_addr = std::env::var("SNAP2POST_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8787".to_string())
            .parse()
            .map_err(|e| IngestError::InvalidConfig(format!("SNAP2POST_BIND: {e}")))?;
        Ok(ProxyConfig {
            bind_addr,
            ingest: IngestConfig::default(),
            api_key,
        })
    }
}

struct ProxyState {
    provider: Arc<dyn VisionProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    #[serde(default)]
    image_base64: String,
}

/// Build the proxy router. Split from [`serve`] so tests can drive the
/// router without binding a socket.
pub fn router(config: &ProxyConfig) -> Result<Router, IngestError> {
    let provider: Arc<dyn VisionProvider> = match config.ingest.provider.clone() {
        Some(p) => p,
        None => Arc::new(OpenAiVision::new(&config.ingest, config.api_key.clone())?),
    };
    Ok(router_with_provider(provider))
}

fn router_with_provider(provider: Arc<dyn VisionProvider>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ]);

    Router::new()
        .route("/analyze-instagram-image", post(analyze))
        .layer(cors)
        .with_state(Arc::new(ProxyState { provider }))
}

/// Run the proxy until the process is stopped.
pub async fn serve(config: ProxyConfig) -> Result<(), IngestError> {
    let app = router(&config)?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| IngestError::Internal(format!("bind {}: {e}", config.bind_addr)))?;
    info!(addr = %config.bind_addr, "extraction proxy listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| IngestError::Internal(format!("server: {e}")))
}

async fn analyze(
    State(state): State<Arc<ProxyState>>,
    Json(body): Json<AnalyzeBody>,
) -> Response {
    if body.image_base64.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, json!({ "error": "No image provided" }));
    }

    let request = ExtractionRequest {
        image_base64: body.image_base64,
        // The dashboard uploads screenshots as JPEG data URIs.
        mime: "image/jpeg".to_string(),
        instruction: crate::prompts::USER_INSTRUCTION.to_string(),
    };

    let completion = match state.provider.complete(&request).await {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "upstream vision call failed");
            return error_response(StatusCode::BAD_GATEWAY, json!({ "error": e.to_string() }));
        }
    };

    match normalize::normalize(&completion) {
        Ok(extraction) => (
            StatusCode::OK,
            Json(json!({ "success": true, "instagramData": extraction })),
        )
            .into_response(),
        Err(e) => {
            let raw = e.raw_completion().unwrap_or("No response").to_string();
            warn!(raw, "completion was not JSON-recoverable");
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Could not parse Instagram content from image",
                    "rawResponse": raw,
                }),
            )
        }
    }
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::Request;
    use tower::ServiceExt;

    struct StubProvider(Result<String, String>);

    #[async_trait]
    impl VisionProvider for StubProvider {
        async fn complete(&self, _r: &ExtractionRequest) -> Result<String, IngestError> {
            self.0
                .clone()
                .map_err(|detail| IngestError::AnalysisFailed { detail })
        }
    }

    fn app(completion: Result<String, String>) -> Router {
        router_with_provider(Arc::new(StubProvider(completion)))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_analyze(payload: serde_json::Value) -> Request<axum::body::Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze-instagram-image")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(payload.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn successful_extraction() {
        let app = app(Ok(r#"```json
{"caption":"hi","likes":"12","comments":1,"username":"u","postedDate":"","hashtags":[]}
```"#
            .into()));
        let response = app
            .oneshot(post_analyze(json!({ "imageBase64": "QUJD" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["instagramData"]["likes"], 12);
        assert_eq!(body["instagramData"]["caption"], "hi");
    }

    #[tokio::test]
    async fn missing_image_is_400() {
        let response = app(Ok("{}".into()))
            .oneshot(post_analyze(json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No image provided");
    }

    #[tokio::test]
    async fn unparsable_completion_is_422_with_raw() {
        let response = app(Ok("Sorry, I cannot process this image.".into()))
            .oneshot(post_analyze(json!({ "imageBase64": "QUJD" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["rawResponse"], "Sorry, I cannot process this image.");
    }

    #[tokio::test]
    async fn upstream_failure_is_502() {
        let response = app(Err("connection refused".into()))
            .oneshot(post_analyze(json!({ "imageBase64": "QUJD" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/analyze-instagram-image")
            .header("origin", "https://dashboard.example")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "authorization, apikey")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app(Ok("{}".into())).oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        let allowed = headers["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("apikey"));
        assert!(allowed.contains("x-client-info"));
        assert!(allowed.contains("content-type"));
    }
}

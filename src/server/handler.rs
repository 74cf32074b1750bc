use super::error::ApiError;
use super::framer::{FramingStrategy, StreamSession};
use super::quota::{Caller, GuestQuota, QuotaDecision, QuotaGate};
use crate::api::UpstreamAdapter;
use crate::config::Config;
use crate::types::GenerateRequest;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn UpstreamAdapter>,
    pub quota: Arc<dyn QuotaGate>,
    pub api_tokens: Arc<HashSet<String>>,
    pub default_model: String,
    pub framing: FramingStrategy,
}

impl AppState {
    pub fn from_config(config: &Config, upstream: Arc<dyn UpstreamAdapter>) -> Self {
        Self {
            upstream,
            quota: Arc::new(GuestQuota::new(config.guest_suggestion_limit)),
            api_tokens: Arc::new(config.api_tokens.clone()),
            default_model: config.model.clone(),
            framing: config.framing,
        }
    }
}

/// GET /api/health -> 200 OK
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /api/generate
///
/// Validates the request, checks quota, opens the provider stream and
/// responds with a chunked body framed per mode. Every failure before the
/// provider accepts the request is answered with a JSON error and no stream.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match open_exchange(&state, &headers, &body).await {
        Ok(response) => response,
        Err(error) => {
            tracing::info!(status = %error.status(), reason = %error, "generate request rejected");
            error.into_response()
        }
    }
}

async fn open_exchange(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("request body is empty".to_string()));
    }
    let request: GenerateRequest = serde_json::from_slice(body)
        .map_err(|error| ApiError::Validation(error.to_string()))?;
    request.validate().map_err(ApiError::Validation)?;

    let caller = Caller::from_headers(headers, &state.api_tokens);
    let remaining = match state.quota.check(&caller, request.mode).await {
        QuotaDecision::Exceeded => return Err(ApiError::QuotaExceeded),
        QuotaDecision::Allowed { remaining } => Some(remaining),
        QuotaDecision::Unmetered => None,
    };

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.default_model.clone());
    let fragments = state
        .upstream
        .open(&request.prompt, &model)
        .await
        .inspect_err(|error| tracing::warn!(error = %error, %model, "upstream open failed"))?;

    tracing::info!(
        mode = %request.mode,
        %model,
        caller = caller.kind(),
        remaining = ?remaining,
        "stream session opened"
    );

    let session = StreamSession::new(request.mode, state.framing);
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache");
    if let Some(remaining) = remaining {
        response = response.header(RATE_LIMIT_REMAINING_HEADER, remaining);
    }
    response
        .body(Body::from_stream(session.into_body_stream(fragments)))
        .map_err(|error| ApiError::Upstream {
            details: error.to_string(),
        })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate", post(generate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_client::{MockChunk, MockUpstream};
    use crate::api::UpstreamError;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn state_with(upstream: MockUpstream, guest_limit: u32) -> AppState {
        AppState {
            upstream: Arc::new(upstream),
            quota: Arc::new(GuestQuota::new(guest_limit)),
            api_tokens: Arc::new(HashSet::from(["token-1".to_string()])),
            default_model: "gemini-test".to_string(),
            framing: FramingStrategy::Tokenizer,
        }
    }

    fn generate_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_translation_streams_framed_records() {
        let upstream = MockUpstream::fragments(&[
            r#"{"type":"e"#,
            r#"xpression","value":"Hel"#,
            "lo\"}\n{\"type\":\"main_translation\",\"value\":\"Bonjour...\"}\n",
        ]);
        let app = build_router(state_with(upstream.clone(), 5));

        let response = app
            .oneshot(generate_request(r#"{"prompt":"Hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(RATE_LIMIT_REMAINING_HEADER).is_none());
        assert_eq!(
            body_string(response).await,
            "{\"type\":\"expression\",\"value\":\"Hello\"}\n{\"type\":\"main_translation\",\"value\":\"Bonjour...\"}\n"
        );
        assert_eq!(
            upstream.seen_prompts(),
            vec![("Hello".to_string(), "gemini-test".to_string())]
        );
    }

    #[tokio::test]
    async fn test_explanation_passes_text_through() {
        let upstream = MockUpstream::fragments(&["Bonjour is ", "a greeting."]);
        let app = build_router(state_with(upstream, 5));
        let response = app
            .oneshot(generate_request(
                r#"{"prompt":"explain","mode":"explanation","model":"gemini-pro"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Bonjour is a greeting.");
    }

    #[tokio::test]
    async fn test_invalid_body_returns_400_without_opening_upstream() {
        let upstream = MockUpstream::fragments(&["unused"]);
        let app = build_router(state_with(upstream.clone(), 5));

        for body in ["", "not json", r#"{"prompt":""}"#, r#"{"prompt":"x","mode":"poem"}"#] {
            let response = app.clone().oneshot(generate_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
            let json: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert!(json["error"].is_string());
        }
        assert!(upstream.seen_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_model_outside_identifier_charset_returns_400() {
        let upstream = MockUpstream::fragments(&["unused"]);
        let app = build_router(state_with(upstream.clone(), 5));

        let response = app
            .oneshot(generate_request(
                r#"{"prompt":"x","model":"../../../v1/files?x="}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("invalid model name"));
        assert!(upstream.seen_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_guest_suggestion_over_quota_returns_429() {
        let upstream = MockUpstream::fragments(&["unused"]);
        let app = build_router(state_with(upstream.clone(), 0));

        let response = app
            .oneshot(generate_request(r#"{"prompt":"x","mode":"suggestion"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_string(response).await;
        assert!(body.contains("Log in to continue"));
        assert!(!body.contains("\"type\""));
        assert!(upstream.seen_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_guest_suggestion_reports_remaining_quota() {
        let upstream = MockUpstream::fragments(&[r#"{"type":"alternative","value":"a"}"#]);
        let app = build_router(state_with(upstream, 3));
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("x-guest-id", "device-1")
            .body(Body::from(r#"{"prompt":"x","mode":"suggestion"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(RATE_LIMIT_REMAINING_HEADER).unwrap(),
            "2"
        );
    }

    #[tokio::test]
    async fn test_authenticated_suggestion_skips_quota() {
        let upstream = MockUpstream::fragments(&[r#"{"type":"alternative","value":"a"}"#]);
        let app = build_router(state_with(upstream, 0));
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("authorization", "Bearer token-1")
            .body(Body::from(r#"{"prompt":"x","mode":"suggestion"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(RATE_LIMIT_REMAINING_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_upstream_setup_failures_map_to_503_and_500() {
        let upstream = MockUpstream::new(vec![
            Err(UpstreamError::Overloaded),
            Err(UpstreamError::Failed("HTTP 400: bad key".to_string())),
        ]);
        let app = build_router(state_with(upstream, 5));

        let overloaded = app
            .clone()
            .oneshot(generate_request(r#"{"prompt":"x"}"#))
            .await
            .unwrap();
        assert_eq!(overloaded.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value =
            serde_json::from_str(&body_string(overloaded).await).unwrap();
        assert_eq!(json["error"], "Gemini overloaded");

        let failed = app
            .oneshot(generate_request(r#"{"prompt":"x"}"#))
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body_string(failed).await).unwrap();
        assert_eq!(json["error"], "Gemini API error");
        assert_eq!(json["details"], "HTTP 400: bad key");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts_body() {
        let upstream = MockUpstream::new(vec![Ok(vec![
            MockChunk::Fragment(r#"{"type":"expression","value":"a"}"#.to_string()),
            MockChunk::Fail("reset".to_string()),
        ])]);
        let app = build_router(state_with(upstream, 5));
        let response = app
            .oneshot(generate_request(r#"{"prompt":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let app = build_router(state_with(MockUpstream::default(), 5));
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

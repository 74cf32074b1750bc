use crate::api::UpstreamError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Guest suggestion limit reached. Log in to continue.";

/// Failures resolved before any stream is opened.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("guest quota exceeded")]
    QuotaExceeded,

    #[error("upstream provider overloaded")]
    UpstreamOverloaded,

    #[error("upstream provider error: {details}")]
    Upstream { details: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamOverloaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Overloaded => ApiError::UpstreamOverloaded,
            UpstreamError::Failed(details) | UpstreamError::Stream(details) => {
                ApiError::Upstream { details }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(detail) => json!({ "error": detail }),
            ApiError::QuotaExceeded => json!({ "error": QUOTA_EXCEEDED_MESSAGE }),
            ApiError::UpstreamOverloaded => json!({ "error": "Gemini overloaded" }),
            ApiError::Upstream { details } => {
                json!({ "error": "Gemini API error", "details": details })
            }
        };
        (status, Json(body)).into_response()
    }
}

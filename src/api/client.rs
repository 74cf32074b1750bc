use super::logging::emit_debug_payload;
use super::stream::StreamParser;
use crate::config::Config;
use crate::types::GeminiRequest;
use crate::util::is_local_endpoint_url;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::pin::Pin;

/// Ordered text fragments from the provider, of arbitrary size.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream provider overloaded")]
    Overloaded,

    #[error("upstream request failed: {0}")]
    Failed(String),

    #[error("upstream stream failed: {0}")]
    Stream(String),
}

/// Source of provider fragments for one exchange.
///
/// `open` resolves once the provider has accepted the request, so setup
/// failures surface before any response body is started.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    async fn open(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    debug_payload: bool,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            debug_payload: config.debug_payload,
        }
    }

    fn request_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.api_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl UpstreamAdapter for GeminiClient {
    async fn open(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError> {
        let request_url = self.request_url(model);
        let payload = GeminiRequest::user_prompt(prompt);

        if self.debug_payload {
            emit_debug_payload(&request_url, &payload);
        }

        let mut request = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-goog-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_request_error(&error, &request_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let mut bytes = response.bytes_stream();
        let fragments = async_stream::stream! {
            let mut parser = StreamParser::new();
            while let Some(chunk) = bytes.next().await {
                let parsed = match chunk {
                    Ok(chunk) => parser.process(&chunk),
                    Err(error) => Err(UpstreamError::Stream(error.to_string())),
                };
                match parsed {
                    Ok(fragments) => {
                        for fragment in fragments {
                            yield Ok(fragment);
                        }
                    }
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                }
            }
            match parser.finish() {
                Ok(Some(fragment)) => yield Ok(fragment),
                Ok(None) => {}
                Err(error) => yield Err(error),
            }
        };
        Ok(Box::pin(fragments))
    }
}

fn classify_status(status: StatusCode, body: &str) -> UpstreamError {
    if status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::TOO_MANY_REQUESTS
        || body.to_ascii_lowercase().contains("overloaded")
    {
        return UpstreamError::Overloaded;
    }
    let body = body.trim();
    if body.is_empty() {
        UpstreamError::Failed(format!("HTTP {status}"))
    } else {
        UpstreamError::Failed(format!("HTTP {status}: {body}"))
    }
}

fn map_request_error(error: &reqwest::Error, request_url: &str) -> UpstreamError {
    let display_url = request_url.split('?').next().unwrap_or(request_url);
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return UpstreamError::Failed(format!(
            "cannot reach local provider endpoint '{display_url}'. Start your local server or update GEMINI_API_URL."
        ));
    }
    if error.is_connect() {
        return UpstreamError::Failed(format!("cannot reach provider endpoint '{display_url}'"));
    }
    if error.is_timeout() {
        return UpstreamError::Failed(format!("provider request to '{display_url}' timed out"));
    }
    UpstreamError::Failed(format!("provider request to '{display_url}' failed"))
}

use super::error::ClientError;
use super::refresh::{CredentialStore, Credentials, HttpTokenRefresher, TokenRefresher};
use crate::config::ClientConfig;
use crate::server::handler::RATE_LIMIT_REMAINING_HEADER;
use crate::types::GenerateRequest;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// A response that passed the status checks; the body has not been read.
pub struct OpenedStream {
    pub body: ByteStream,
    pub rate_limit_remaining: Option<u32>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP client for `POST /api/generate`.
pub struct TranslateClient {
    http: reqwest::Client,
    generate_url: String,
    credentials: Option<Arc<CredentialStore>>,
    guest_id: Option<String>,
}

impl TranslateClient {
    pub fn new(generate_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            generate_url: generate_url.into(),
            credentials: None,
            guest_id: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(config.generate_url());
        if let Some(access_token) = &config.access_token {
            let refresher = config
                .refresh_url
                .as_ref()
                .map(|url| Arc::new(HttpTokenRefresher::new(url.clone())) as Arc<dyn TokenRefresher>);
            let credentials = Credentials::new(access_token.clone(), config.refresh_token.clone());
            client = client.with_credentials(Arc::new(CredentialStore::new(credentials, refresher)));
        }
        client
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_guest_id(mut self, guest_id: impl Into<String>) -> Self {
        self.guest_id = Some(guest_id.into());
        self
    }

    /// Send `request` and check the response status.
    ///
    /// A 401 with credentials attached triggers one refresh and one retry.
    pub async fn open(&self, request: &GenerateRequest) -> Result<OpenedStream, ClientError> {
        let token = match &self.credentials {
            Some(store) => Some(store.access_token().await),
            None => None,
        };

        let mut response = self.send(request, token.as_deref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let (Some(store), Some(stale)) = (&self.credentials, token) {
                let fresh = store.refresh_after(&stale).await.map_err(|error| {
                    tracing::warn!(error = %error, "token refresh failed");
                    ClientError::Unauthorized
                })?;
                tracing::debug!("retrying generate request with refreshed token");
                response = self.send(request, Some(&fresh)).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let rate_limit_remaining = response
            .headers()
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|error| ClientError::Stream(error.to_string())))
            .boxed();

        Ok(OpenedStream {
            body,
            rate_limit_remaining,
        })
    }

    async fn send(
        &self,
        request: &GenerateRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self.http.post(&self.generate_url).json(request);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        } else if let Some(guest_id) = &self.guest_id {
            builder = builder.header("x-guest-id", guest_id);
        }
        builder.send().await.map_err(|error| {
            ClientError::Stream(format!("request to {} failed: {error}", self.generate_url))
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> ClientError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .clone()
        .unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        StatusCode::BAD_REQUEST => ClientError::Validation(message),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ClientError::QuotaExceeded(message),
        StatusCode::SERVICE_UNAVAILABLE => ClientError::Overloaded,
        _ => ClientError::Upstream(parsed.details.unwrap_or(message)),
    }
}

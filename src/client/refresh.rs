use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, TryFutureExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials>;
}

/// Exchanges a refresh token at `POST {refresh_url}` with body
/// `{"refresh_token": ...}`.
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    refresh_url: String,
}

impl HttpTokenRefresher {
    pub fn new(refresh_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            refresh_url: refresh_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials> {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .with_context(|| format!("refresh request to {} failed", self.refresh_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("refresh rejected with HTTP {status}: {body}");
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .context("refresh response is not valid JSON")?;
        Ok(Credentials {
            access_token: refreshed.access_token,
            // Servers that do not rotate refresh tokens omit the field.
            refresh_token: refreshed
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
        })
    }
}

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, Arc<anyhow::Error>>>>;

/// Collapses concurrent calls for the same key into one execution.
///
/// The first caller runs the work; callers arriving while it is in flight
/// await the same result. The slot is cleared once the work completes, so a
/// later call starts fresh.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, SharedResult<V>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, Arc<anyhow::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match inflight.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = work().map_err(Arc::new).boxed().shared();
                    inflight.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            inflight.remove(&key);
        }
        result
    }

    pub fn in_flight(&self) -> usize {
        self.inflight
            .lock()
            .map(|inflight| inflight.len())
            .unwrap_or_default()
    }
}

/// Current credentials plus single-flight refresh.
///
/// Any number of requests may see a 401 at once; they all wait on one
/// refresh call and then retry with its result.
pub struct CredentialStore {
    current: RwLock<Credentials>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    flight: SingleFlight<String, Credentials>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials, refresher: Option<Arc<dyn TokenRefresher>>) -> Self {
        Self {
            current: RwLock::new(credentials),
            refresher,
            flight: SingleFlight::new(),
        }
    }

    pub async fn access_token(&self) -> String {
        self.current.read().await.access_token.clone()
    }

    /// Obtain a token newer than `stale_access_token`.
    ///
    /// If another caller already replaced the stale token, its replacement is
    /// returned without contacting the refresh endpoint.
    pub async fn refresh_after(&self, stale_access_token: &str) -> Result<String> {
        let refresh_token = {
            let current = self.current.read().await;
            if current.access_token != stale_access_token {
                return Ok(current.access_token.clone());
            }
            current
                .refresh_token
                .clone()
                .context("no refresh token available")?
        };
        let Some(refresher) = self.refresher.clone() else {
            bail!("no refresh endpoint configured");
        };

        let key = refresh_token.clone();
        let refreshed = self
            .flight
            .run(key, move || async move { refresher.refresh(&refresh_token).await })
            .await
            .map_err(|error| anyhow!("{error:#}"))?;

        let mut current = self.current.write().await;
        if current.access_token == stale_access_token {
            tracing::info!("access token refreshed");
            *current = refreshed.clone();
        }
        Ok(current.access_token.clone())
    }
}

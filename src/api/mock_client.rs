use super::client::{FragmentStream, UpstreamAdapter, UpstreamError};
use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex};

/// One scripted item of a mock provider stream.
#[derive(Debug, Clone)]
pub enum MockChunk {
    Fragment(String),
    Fail(String),
}

/// Scripted upstream: each `open` consumes the next configured response.
#[derive(Clone, Default)]
pub struct MockUpstream {
    responses: Arc<Mutex<Vec<Result<Vec<MockChunk>, UpstreamError>>>>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockUpstream {
    pub fn new(responses: Vec<Result<Vec<MockChunk>, UpstreamError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            prompts: Arc::default(),
        }
    }

    /// A mock whose single response streams the given fragments.
    pub fn fragments<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self::new(vec![Ok(fragments
            .iter()
            .map(|f| MockChunk::Fragment(f.as_ref().to_string()))
            .collect())])
    }

    /// `(prompt, model)` pairs seen so far.
    pub fn seen_prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UpstreamAdapter for MockUpstream {
    async fn open(&self, prompt: &str, model: &str) -> Result<FragmentStream, UpstreamError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), model.to_string()));
        }

        let next = {
            let mut responses = self
                .responses
                .lock()
                .map_err(|_| UpstreamError::Failed("mock upstream poisoned".to_string()))?;
            if responses.is_empty() {
                return Err(UpstreamError::Failed(
                    "MockUpstream: no more responses configured".to_string(),
                ));
            }
            responses.remove(0)
        };

        let items: Vec<Result<String, UpstreamError>> = next?
            .into_iter()
            .map(|chunk| match chunk {
                MockChunk::Fragment(text) => Ok(text),
                MockChunk::Fail(message) => Err(UpstreamError::Stream(message)),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

use super::client::UpstreamError;
use super::logging::emit_sse_parse_error;
use crate::text::Utf8Decoder;
use crate::types::GeminiStreamChunk;
use serde::Deserialize;

#[derive(Deserialize)]
struct InBandError {
    error: InBandErrorBody,
}

#[derive(Deserialize)]
struct InBandErrorBody {
    #[serde(default)]
    message: String,
}

/// Turns the provider's SSE byte stream into text fragments.
///
/// Each complete event yields at most one fragment: the text of its first
/// candidate. Fragment boundaries carry no meaning downstream.
#[derive(Default)]
pub struct StreamParser {
    decoder: Utf8Decoder,
    buffer: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Result<Vec<String>, UpstreamError> {
        let text = self.decoder.decode(chunk);
        self.buffer.extend(text.chars().filter(|c| *c != '\r'));

        let mut fragments = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find("\n\n") {
            let event_end = start + end + 2;
            if let Some(fragment) = parse_event(&self.buffer[start..event_end])? {
                fragments.push(fragment);
            }
            start = event_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(fragments)
    }

    /// Parse a final event that was not followed by a blank line.
    pub fn finish(&mut self) -> Result<Option<String>, UpstreamError> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        let remaining = std::mem::take(&mut self.buffer);
        if remaining.trim().is_empty() {
            return Ok(None);
        }
        parse_event(&remaining)
    }
}

fn parse_event(event_text: &str) -> Result<Option<String>, UpstreamError> {
    let data: Vec<&str> = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data.is_empty() {
        return Ok(None);
    }

    let json_data = data.join("\n");
    if json_data.trim() == "[DONE]" {
        return Ok(None);
    }

    if let Ok(in_band) = serde_json::from_str::<InBandError>(&json_data) {
        return Err(UpstreamError::Stream(in_band.error.message));
    }

    match serde_json::from_str::<GeminiStreamChunk>(&json_data) {
        Ok(chunk) => {
            let text = chunk.text();
            Ok((!text.is_empty()).then_some(text))
        }
        Err(error) => {
            emit_sse_parse_error(&json_data, &error);
            Ok(None)
        }
    }
}

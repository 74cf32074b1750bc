use super::scanner::ObjectScanner;
use crate::api::{FragmentStream, UpstreamError};
use crate::types::Mode;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// How structured mode locates object boundaries in the fragment buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingStrategy {
    /// First `{` to the first following `}`, retried until it parses.
    /// Cannot frame a value that contains `}`.
    BraceScan,
    /// String- and escape-aware depth tracking.
    #[default]
    Tokenizer,
}

impl FramingStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "brace_scan" | "brace-scan" | "brace" => Some(Self::BraceScan),
            "tokenizer" | "token" => Some(Self::Tokenizer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Structured(FramingStrategy),
    Freeform,
}

/// Turns provider fragments into wire frames.
///
/// Structured frames are validated JSON objects terminated by `\n`.
/// Freeform frames are the fragments themselves.
#[derive(Debug)]
pub struct Framer {
    mode: FrameMode,
    buffer: String,
    scanner: ObjectScanner,
}

impl Framer {
    pub fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            buffer: String::new(),
            scanner: ObjectScanner::new(),
        }
    }

    pub fn for_mode(mode: Mode, strategy: FramingStrategy) -> Self {
        if mode.is_structured() {
            Self::new(FrameMode::Structured(strategy))
        } else {
            Self::new(FrameMode::Freeform)
        }
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        let strategy = match self.mode {
            FrameMode::Freeform => {
                return if fragment.is_empty() {
                    Vec::new()
                } else {
                    vec![fragment.to_string()]
                };
            }
            FrameMode::Structured(strategy) => strategy,
        };

        self.buffer.push_str(fragment);
        let mut frames = Vec::new();
        match strategy {
            FramingStrategy::BraceScan => self.brace_scan(&mut frames),
            FramingStrategy::Tokenizer => self.tokenize(&mut frames),
        }
        frames
    }

    /// End of input. Returns whatever never formed a complete frame.
    pub fn finish(&mut self) -> Option<String> {
        self.scanner = ObjectScanner::new();
        let remainder = std::mem::take(&mut self.buffer);
        if remainder.trim().is_empty() {
            None
        } else {
            Some(remainder)
        }
    }

    fn brace_scan(&mut self, frames: &mut Vec<String>) {
        loop {
            let Some(start) = self.buffer.find('{') else {
                return;
            };
            let Some(offset) = self.buffer[start..].find('}') else {
                return;
            };
            let end = start + offset;
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.buffer[start..=end])
            else {
                return;
            };
            frames.extend(compact_frame(&value));
            self.buffer.drain(..=end);
        }
    }

    fn tokenize(&mut self, frames: &mut Vec<String>) {
        while let Some(range) = self.scanner.next_object(&self.buffer) {
            let end = *range.end();
            let candidate = &self.buffer[range];
            match serde_json::from_str::<serde_json::Value>(candidate) {
                Ok(value) => frames.extend(compact_frame(&value)),
                Err(error) => {
                    tracing::warn!(error = %error, candidate, "dropping malformed balanced object");
                }
            }
            self.buffer.drain(..=end);
            self.scanner.drained(end + 1);
        }

        let settled = self.scanner.settled_len();
        if settled > 0 {
            self.buffer.drain(..settled);
            self.scanner.drained(settled);
        }
    }
}

/// One wire frame: the object on a single line, whatever whitespace the
/// provider put inside it.
fn compact_frame(value: &serde_json::Value) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(mut line) => {
            line.push('\n');
            Some(line)
        }
        Err(error) => {
            tracing::warn!(error = %error, "dropping object that failed to re-serialize");
            None
        }
    }
}

/// Server-side state for one HTTP exchange.
#[derive(Debug)]
pub struct StreamSession {
    mode: Mode,
    framer: Framer,
}

impl StreamSession {
    pub fn new(mode: Mode, strategy: FramingStrategy) -> Self {
        Self {
            mode,
            framer: Framer::for_mode(mode, strategy),
        }
    }

    /// Frame `fragments` into response body chunks.
    ///
    /// An upstream error ends the stream with that error, which aborts the
    /// chunked response. Structured leftovers are discarded at end of stream.
    pub fn into_body_stream(
        self,
        mut fragments: FragmentStream,
    ) -> impl Stream<Item = Result<Bytes, UpstreamError>> + Send {
        let Self { mode, mut framer } = self;
        async_stream::stream! {
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(fragment) => {
                        for frame in framer.push(&fragment) {
                            yield Ok(Bytes::from(frame));
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%mode, error = %error, "upstream failed mid-stream, aborting body");
                        yield Err(error);
                        return;
                    }
                }
            }

            if let Some(remainder) = framer.finish() {
                tracing::warn!(
                    %mode,
                    bytes = remainder.len(),
                    "discarding unframed remainder at end of stream"
                );
            }
            tracing::debug!(%mode, "stream session closed");
        }
    }
}

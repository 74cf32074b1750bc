use crate::text::Utf8Decoder;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Splits a byte stream into newline-delimited lines.
///
/// Whitespace-only lines are skipped. The trailing partial line is held until
/// more bytes arrive or [`LineDecoder::finish`] is called.
#[derive(Debug, Default)]
pub struct LineDecoder {
    decoder: Utf8Decoder,
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let lines = self.buffer[..last_newline]
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        self.buffer.drain(..=last_newline);
        lines
    }

    /// Yield the unterminated remainder, once.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        let remainder = std::mem::take(&mut self.buffer);
        if remainder.trim().is_empty() {
            None
        } else {
            Some(remainder)
        }
    }
}

/// Lazily decode `reader` into lines.
///
/// Consumes the reader, so the sequence cannot be restarted. A read error is
/// yielded and ends the sequence; dropping the returned stream releases the
/// reader.
pub fn decode_lines<S, E>(reader: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let mut reader = Box::pin(reader);
        let mut decoder = LineDecoder::new();
        while let Some(chunk) = reader.next().await {
            match chunk {
                Ok(chunk) => {
                    for line in decoder.process(&chunk) {
                        yield Ok(line);
                    }
                }
                Err(error) => {
                    yield Err(error);
                    return;
                }
            }
        }
        if let Some(line) = decoder.finish() {
            yield Ok(line);
        }
    }
}

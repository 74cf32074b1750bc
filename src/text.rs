/// Incremental UTF-8 decoder.
///
/// Bytes of a multi-byte character split across chunks are held back until
/// the rest of the sequence arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(error) => {
                    let valid_up_to = consumed + error.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&self.pending[consumed..valid_up_to])
                            .unwrap_or_default(),
                    );
                    match error.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + invalid_len;
                        }
                        None => {
                            // Truncated sequence at the end; wait for more bytes.
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flush at end of input. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character_decodes_once_complete() {
        let bytes = "é".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_four_byte_character_split_three_ways() {
        let bytes = "a😀b".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        out.push_str(&decoder.decode(&bytes[..2]));
        out.push_str(&decoder.decode(&bytes[2..4]));
        out.push_str(&decoder.decode(&bytes[4..]));
        assert_eq!(out, "a😀b");
    }

    #[test]
    fn test_invalid_byte_is_replaced_and_decoding_continues() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xffgo"), "ok\u{FFFD}go");
    }

    #[test]
    fn test_finish_replaces_dangling_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&"ü".as_bytes()[..1]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}

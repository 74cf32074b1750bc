use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InObject { depth: usize },
    InString { depth: usize },
    Escaped { depth: usize },
}

/// Resumable scanner that finds balanced top-level JSON objects in a growing
/// text buffer.
///
/// Braces inside string literals (including escaped quotes) do not affect
/// depth. Bytes already scanned are never revisited; after the caller drains
/// a prefix of the buffer it must call [`ObjectScanner::drained`].
#[derive(Debug, Clone)]
pub struct ObjectScanner {
    state: ScanState,
    start: usize,
    pos: usize,
}

impl Default for ObjectScanner {
    fn default() -> Self {
        Self {
            state: ScanState::Outside,
            start: 0,
            pos: 0,
        }
    }
}

impl ObjectScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue scanning `buffer` and return the byte range of the next
    /// complete object, if one has closed.
    pub fn next_object(&mut self, buffer: &str) -> Option<RangeInclusive<usize>> {
        let bytes = buffer.as_bytes();
        while self.pos < bytes.len() {
            let index = self.pos;
            let byte = bytes[index];
            self.pos += 1;

            self.state = match (self.state, byte) {
                (ScanState::Outside, b'{') => {
                    self.start = index;
                    ScanState::InObject { depth: 1 }
                }
                (ScanState::Outside, _) => ScanState::Outside,
                (ScanState::InObject { depth }, b'{') => ScanState::InObject { depth: depth + 1 },
                (ScanState::InObject { depth: 1 }, b'}') => {
                    self.state = ScanState::Outside;
                    return Some(self.start..=index);
                }
                (ScanState::InObject { depth }, b'}') => ScanState::InObject { depth: depth - 1 },
                (ScanState::InObject { depth }, b'"') => ScanState::InString { depth },
                (ScanState::InObject { depth }, _) => ScanState::InObject { depth },
                (ScanState::InString { depth }, b'\\') => ScanState::Escaped { depth },
                (ScanState::InString { depth }, b'"') => ScanState::InObject { depth },
                (ScanState::InString { depth }, _) => ScanState::InString { depth },
                (ScanState::Escaped { depth }, _) => ScanState::InString { depth },
            };
        }
        None
    }

    /// Whether the scanner is between objects.
    pub fn is_outside(&self) -> bool {
        self.state == ScanState::Outside
    }

    /// Bytes of the buffer that no pending object depends on.
    pub fn settled_len(&self) -> usize {
        if self.is_outside() {
            self.pos
        } else {
            self.start
        }
    }

    /// Shift indices after the caller removed `count` leading bytes.
    pub fn drained(&mut self, count: usize) {
        self.pos = self.pos.saturating_sub(count);
        self.start = self.start.saturating_sub(count);
    }
}

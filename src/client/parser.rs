use crate::api::logging::emit_framing_defect;
use crate::types::{Record, Tag};

/// A consumer-side line that is not a valid record.
#[derive(Debug, thiserror::Error)]
#[error("line is not a valid record: {source}")]
pub struct ParseError {
    pub line: String,
    #[source]
    pub source: serde_json::Error,
}

/// Parse one line as a record, without normalizing its value.
pub fn parse_record(line: &str) -> Result<Record, ParseError> {
    serde_json::from_str(line).map_err(|source| ParseError {
        line: line.to_string(),
        source,
    })
}

/// A line classified by its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A displayable record, value normalized.
    Item(Record),
    /// Detected input language. Not displayable.
    Language(String),
    /// In-band error; nothing after it belongs to the exchange.
    Terminal(String),
}

/// Parses structured-mode lines into records for one exchange.
///
/// After a terminal record every later line is refused.
#[derive(Debug, Default)]
pub struct RecordParser {
    halted: bool,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// `None` for lines that carry nothing for the consumer: lines after a
    /// terminal record, unknown tags, and unparseable lines (logged as
    /// framing defects).
    pub fn parse(&mut self, line: &str) -> Option<ParsedLine> {
        if self.halted {
            return None;
        }

        let record = match parse_record(line) {
            Ok(record) => record,
            Err(error) => {
                emit_framing_defect(&error.line, &error.source);
                return None;
            }
        };

        match record.tag {
            Tag::Error => {
                self.halted = true;
                tracing::info!(value = %record.value, "terminal error record received");
                Some(ParsedLine::Terminal(record.value.to_string()))
            }
            Tag::OrigLangCode => Some(ParsedLine::Language(record.value.to_string().trim().to_string())),
            Tag::Unknown => {
                tracing::debug!(line, "skipping record with unrecognized tag");
                None
            }
            Tag::Expression | Tag::MainTranslation | Tag::Alternative => {
                Some(ParsedLine::Item(Record {
                    tag: record.tag,
                    value: record.value.normalized(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values_are_normalized() {
        let mut parser = RecordParser::new();
        assert_eq!(
            parser.parse(r#"{"type":"main_translation","value":" Bonjour... "}"#),
            Some(ParsedLine::Item(Record::new(Tag::MainTranslation, "Bonjour")))
        );
        assert_eq!(
            parser.parse(r#"{"type":"alternative","value":123}"#),
            Some(ParsedLine::Item(Record::new(Tag::Alternative, 123)))
        );
    }

    #[test]
    fn test_language_code_is_out_of_band() {
        let mut parser = RecordParser::new();
        assert_eq!(
            parser.parse(r#"{"type":"orig_lang_code","value":"en"}"#),
            Some(ParsedLine::Language("en".to_string()))
        );
    }

    #[test]
    fn test_terminal_record_halts_parsing() {
        let mut parser = RecordParser::new();
        assert_eq!(
            parser.parse(r#"{"type":"error","value":"empty audio"}"#),
            Some(ParsedLine::Terminal("empty audio".to_string()))
        );
        assert!(parser.is_halted());
        assert_eq!(
            parser.parse(r#"{"type":"expression","value":"late"}"#),
            None
        );
    }

    #[test]
    fn test_parse_record_reports_offending_line() {
        let error = parse_record("{\"type\":").unwrap_err();
        assert_eq!(error.line, "{\"type\":");
        assert!(error.to_string().starts_with("line is not a valid record"));
    }

    #[test]
    fn test_unparseable_and_unknown_lines_are_skipped() {
        let mut parser = RecordParser::new();
        assert_eq!(parser.parse(r#"{"type":"expression","value":"a"#), None);
        assert_eq!(parser.parse(r#"{"type":"gloss","value":"a"}"#), None);
        assert_eq!(parser.parse(r#"{"type":"expression","value":true}"#), None);
        assert!(!parser.is_halted());
    }
}

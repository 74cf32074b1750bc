use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a structured record on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Expression,
    MainTranslation,
    Alternative,
    OrigLangCode,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RecordValue {
    Text(String),
    Number(serde_json::Number),
}

impl RecordValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RecordValue::Text(text) => Some(text),
            RecordValue::Number(_) => None,
        }
    }

    /// Strip surrounding whitespace and trailing periods from text values.
    /// Numbers pass through unchanged.
    pub fn normalized(self) -> Self {
        match self {
            RecordValue::Text(text) => {
                RecordValue::Text(text.trim().trim_end_matches('.').trim_end().to_string())
            }
            number => number,
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Text(text) => f.write_str(text),
            RecordValue::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Number(value.into())
    }
}

/// One parsed frame of structured output: `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "type")]
    pub tag: Tag,
    pub value: RecordValue,
}

impl Record {
    pub fn new(tag: Tag, value: impl Into<RecordValue>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

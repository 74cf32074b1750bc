use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller asks the provider for. Determines the response framing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Translation,
    Explanation,
    Suggestion,
}

impl Mode {
    /// Translation and suggestion responses are framed as newline-delimited
    /// JSON records; explanations stream as raw text.
    pub fn is_structured(self) -> bool {
        !matches!(self, Mode::Explanation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Translation => "translation",
            Mode::Explanation => "explanation",
            Mode::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub mode: Mode,
}

/// Model names are pasted into the provider URL path, so only plain
/// identifier characters are accepted.
pub fn is_valid_model_name(model: &str) -> bool {
    !model.is_empty()
        && !model.contains("..")
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            mode,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must be a non-empty string".to_string());
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err("model must not be empty when provided".to_string());
            }
            if !is_valid_model_name(model) {
                return Err(format!("invalid model name '{model}'"));
            }
        }
        Ok(())
    }
}

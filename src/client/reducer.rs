use super::error::ClientError;
use crate::types::{GenerateRequest, Mode, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    /// The server accepted the request and started the body.
    Opened { rate_limit_remaining: Option<u32> },
    Record(Record),
    Language(String),
    Text(String),
    Finished,
    Failed(ClientError),
}

/// An event tagged with the exchange it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeUpdate {
    pub epoch: u64,
    pub event: ExchangeEvent,
}

/// Final accumulation of a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    pub mode: Mode,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The update belongs to a superseded exchange.
    Stale,
    /// The exchange already ended; the update changes nothing.
    Ignored,
    Applied,
    Completed(ExchangeSnapshot),
    Failed(String),
}

/// Accumulates one exchange at a time.
///
/// Every `begin` starts a new epoch; updates from any other epoch are
/// dropped, so a superseded exchange cannot write into the current one.
#[derive(Debug)]
pub struct ExchangeReducer {
    epoch: u64,
    phase: Phase,
    mode: Mode,
    prompt: String,
    records: Vec<Record>,
    text: String,
    detected_language: Option<String>,
    error: Option<ClientError>,
    loading: bool,
    rate_limit_remaining: Option<u32>,
}

impl Default for ExchangeReducer {
    fn default() -> Self {
        Self {
            epoch: 0,
            phase: Phase::Idle,
            mode: Mode::default(),
            prompt: String::new(),
            records: Vec::new(),
            text: String::new(),
            detected_language: None,
            error: None,
            loading: false,
            rate_limit_remaining: None,
        }
    }
}

impl ExchangeReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new exchange, discarding the previous accumulation.
    pub fn begin(&mut self, request: &GenerateRequest) -> u64 {
        self.epoch += 1;
        self.phase = Phase::Requesting;
        self.mode = request.mode;
        self.prompt = request.prompt.clone();
        self.records.clear();
        self.text.clear();
        self.detected_language = None;
        self.error = None;
        self.loading = true;
        self.rate_limit_remaining = None;
        self.epoch
    }

    pub fn apply(&mut self, update: ExchangeUpdate) -> Transition {
        if update.epoch != self.epoch {
            tracing::debug!(
                update_epoch = update.epoch,
                current_epoch = self.epoch,
                "dropping update from superseded exchange"
            );
            return Transition::Stale;
        }
        if !matches!(self.phase, Phase::Requesting | Phase::Streaming) {
            return Transition::Ignored;
        }

        match update.event {
            ExchangeEvent::Opened {
                rate_limit_remaining,
            } => {
                self.rate_limit_remaining = rate_limit_remaining;
                Transition::Applied
            }
            ExchangeEvent::Record(record) => {
                self.mark_streaming();
                self.records.push(record);
                Transition::Applied
            }
            ExchangeEvent::Language(code) => {
                self.mark_streaming();
                self.detected_language = Some(code);
                Transition::Applied
            }
            ExchangeEvent::Text(chunk) => {
                self.mark_streaming();
                self.text.push_str(&chunk);
                Transition::Applied
            }
            ExchangeEvent::Finished => {
                self.phase = Phase::Completed;
                self.loading = false;
                Transition::Completed(self.snapshot())
            }
            ExchangeEvent::Failed(error) => {
                self.phase = Phase::Failed;
                self.loading = false;
                let message = error.user_message();
                self.error = Some(error);
                Transition::Failed(message)
            }
        }
    }

    fn mark_streaming(&mut self) {
        if self.phase == Phase::Requesting {
            self.phase = Phase::Streaming;
            self.loading = false;
        }
    }

    pub fn snapshot(&self) -> ExchangeSnapshot {
        ExchangeSnapshot {
            mode: self.mode,
            prompt: self.prompt.clone(),
            records: self.records.clone(),
            text: self.text.clone(),
            detected_language: self.detected_language.clone(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn detected_language(&self) -> Option<&str> {
        self.detected_language.as_deref()
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn rate_limit_remaining(&self) -> Option<u32> {
        self.rate_limit_remaining
    }
}

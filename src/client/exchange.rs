use super::decoder::decode_lines;
use super::error::ClientError;
use super::history::HistorySink;
use super::parser::{ParsedLine, RecordParser};
use super::reducer::{ExchangeEvent, ExchangeReducer, ExchangeUpdate, Phase, Transition};
use super::transport::TranslateClient;
use crate::text::Utf8Decoder;
use crate::types::GenerateRequest;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn emit(updates: &UnboundedSender<ExchangeUpdate>, epoch: u64, event: ExchangeEvent) {
    let _ = updates.send(ExchangeUpdate { epoch, event });
}

/// Run one exchange and report its events tagged with `epoch`.
///
/// Emits `Opened`, then data events, then exactly one of `Finished` or
/// `Failed`. If `cancel` fires first, nothing further is emitted.
pub async fn run_exchange(
    client: &TranslateClient,
    request: &GenerateRequest,
    epoch: u64,
    cancel: CancellationToken,
    updates: &UnboundedSender<ExchangeUpdate>,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(epoch, "exchange cancelled");
        }
        outcome = drive(client, request, epoch, updates) => match outcome {
            Ok(()) => emit(updates, epoch, ExchangeEvent::Finished),
            Err(error) => {
                tracing::warn!(epoch, error = %error, "exchange failed");
                emit(updates, epoch, ExchangeEvent::Failed(error));
            }
        },
    }
}

async fn drive(
    client: &TranslateClient,
    request: &GenerateRequest,
    epoch: u64,
    updates: &UnboundedSender<ExchangeUpdate>,
) -> Result<(), ClientError> {
    let opened = client.open(request).await?;
    emit(
        updates,
        epoch,
        ExchangeEvent::Opened {
            rate_limit_remaining: opened.rate_limit_remaining,
        },
    );

    if request.mode.is_structured() {
        let mut parser = RecordParser::new();
        let mut lines = std::pin::pin!(decode_lines(opened.body));
        while let Some(line) = lines.next().await {
            match parser.parse(&line?) {
                Some(ParsedLine::Item(record)) => {
                    emit(updates, epoch, ExchangeEvent::Record(record));
                }
                Some(ParsedLine::Language(code)) => {
                    emit(updates, epoch, ExchangeEvent::Language(code));
                }
                Some(ParsedLine::Terminal(value)) => return Err(ClientError::Terminal(value)),
                None => {}
            }
        }
    } else {
        let mut body = opened.body;
        let mut decoder = Utf8Decoder::new();
        while let Some(chunk) = body.next().await {
            let text = decoder.decode(&chunk?);
            if !text.is_empty() {
                emit(updates, epoch, ExchangeEvent::Text(text));
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            emit(updates, epoch, ExchangeEvent::Text(tail));
        }
    }
    Ok(())
}

struct RunningExchange {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Consumer session: at most one exchange in flight.
///
/// Starting a new exchange cancels the previous one. Updates still queued
/// from it carry the old epoch and are dropped by the reducer.
pub struct ExchangeSession {
    client: Arc<TranslateClient>,
    history: Option<Arc<dyn HistorySink>>,
    reducer: ExchangeReducer,
    updates_tx: UnboundedSender<ExchangeUpdate>,
    updates_rx: UnboundedReceiver<ExchangeUpdate>,
    running: Option<RunningExchange>,
}

impl ExchangeSession {
    pub fn new(client: Arc<TranslateClient>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            client,
            history: None,
            reducer: ExchangeReducer::new(),
            updates_tx,
            updates_rx,
            running: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn reducer(&self) -> &ExchangeReducer {
        &self.reducer
    }

    /// Begin a new exchange and return its epoch.
    pub fn start(&mut self, request: GenerateRequest) -> u64 {
        self.cancel_running();
        let epoch = self.reducer.begin(&request);

        let cancel = CancellationToken::new();
        let client = Arc::clone(&self.client);
        let updates = self.updates_tx.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            run_exchange(&client, &request, epoch, token, &updates).await;
        });
        tracing::debug!(epoch, "exchange started");

        self.running = Some(RunningExchange { cancel, handle });
        epoch
    }

    /// Wait for the next event accepted by the current exchange.
    ///
    /// Returns `None` once the exchange has completed or failed, or if none
    /// was started.
    pub async fn next_event(&mut self) -> Option<ExchangeEvent> {
        while self.is_active() {
            let update = self.updates_rx.recv().await?;
            let event = update.event.clone();
            match self.reducer.apply(update) {
                Transition::Stale | Transition::Ignored => continue,
                Transition::Applied => return Some(event),
                Transition::Completed(snapshot) => {
                    self.running = None;
                    if let Some(history) = &self.history {
                        if let Err(error) = history.persist(&snapshot).await {
                            tracing::warn!(error = %error, "failed to persist exchange");
                        }
                    }
                    return Some(event);
                }
                Transition::Failed(message) => {
                    self.running = None;
                    tracing::info!(reason = %message, "exchange ended with failure");
                    return Some(event);
                }
            }
        }
        None
    }

    fn is_active(&self) -> bool {
        let phase = self.reducer.phase();
        phase != Phase::Idle && !phase.is_terminal()
    }

    fn cancel_running(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            if !running.handle.is_finished() {
                tracing::debug!(epoch = self.reducer.epoch(), "superseding in-flight exchange");
            }
        }
    }
}

impl Drop for ExchangeSession {
    fn drop(&mut self) {
        self.cancel_running();
    }
}

use anyhow::Result;
use clap::{Parser, ValueEnum};
use lingostream::client::{
    ExchangeEvent, ExchangeSession, HistorySink, JsonlHistory, TranslateClient,
};
use lingostream::config::ClientConfig;
use lingostream::types::{GenerateRequest, Mode, RecordValue, Tag};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Translation,
    Explanation,
    Suggestion,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Translation => Mode::Translation,
            ModeArg::Explanation => Mode::Explanation,
            ModeArg::Suggestion => Mode::Suggestion,
        }
    }
}

/// Stream a translation, explanation or suggestions from a lingo server.
#[derive(Debug, Parser)]
#[command(name = "lingo", version)]
struct Cli {
    /// Text to translate or explain.
    prompt: String,

    #[arg(short, long, value_enum, default_value = "translation")]
    mode: ModeArg,

    /// Provider model override.
    #[arg(long)]
    model: Option<String>,

    #[arg(long, env = "LINGO_SERVER_URL")]
    server: Option<String>,

    /// Identifies this device for the guest quota.
    #[arg(long, env = "LINGO_GUEST_ID")]
    guest_id: Option<String>,

    /// Append completed exchanges to this JSONL file.
    #[arg(long, env = "LINGO_HISTORY_PATH")]
    history: Option<PathBuf>,
}

fn label(tag: Tag) -> &'static str {
    match tag {
        Tag::Expression => "expression",
        Tag::MainTranslation => "translation",
        Tag::Alternative => "alternative",
        Tag::OrigLangCode => "language",
        Tag::Error => "error",
        Tag::Unknown => "other",
    }
}

fn format_value(value: &RecordValue) -> String {
    match value.as_text() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if cli.history.is_some() {
        config.history_path = cli.history;
    }

    let mut client = TranslateClient::from_config(&config);
    if let Some(guest_id) = cli.guest_id {
        client = client.with_guest_id(guest_id);
    }
    let mut session = ExchangeSession::new(Arc::new(client));
    if let Some(path) = &config.history_path {
        session = session.with_history(Arc::new(JsonlHistory::new(path)) as Arc<dyn HistorySink>);
    }

    let mut request = GenerateRequest::new(cli.prompt, cli.mode.into());
    request.model = cli.model;
    if let Err(reason) = request.validate() {
        eprintln!("Invalid request: {reason}");
        return Ok(ExitCode::from(2));
    }
    session.start(request);

    let mut stdout = std::io::stdout();
    while let Some(event) = session.next_event().await {
        match event {
            ExchangeEvent::Opened {
                rate_limit_remaining: Some(remaining),
            } => eprintln!("({remaining} guest suggestions left)"),
            ExchangeEvent::Opened { .. } => {}
            ExchangeEvent::Record(record) => {
                writeln!(stdout, "{:>12}: {}", label(record.tag), format_value(&record.value))?;
            }
            ExchangeEvent::Language(code) => eprintln!("(detected language: {code})"),
            ExchangeEvent::Text(text) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            ExchangeEvent::Finished => {
                if !session.reducer().text().is_empty() {
                    writeln!(stdout)?;
                }
            }
            ExchangeEvent::Failed(error) => {
                eprintln!("{}", error.user_message());
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

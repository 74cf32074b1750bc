use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::server::FramingStrategy;
use crate::types::is_valid_model_name;
use crate::util::{env_flag, env_string, is_local_endpoint_url};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_GUEST_SUGGESTION_LIMIT: u32 = 10;
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8787";

/// Server configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub bind_addr: String,
    pub guest_suggestion_limit: u32,
    pub api_tokens: HashSet<String>,
    pub framing: FramingStrategy,
    pub debug_payload: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let guest_suggestion_limit = match env_string("LINGO_GUEST_SUGGESTION_LIMIT") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("invalid LINGO_GUEST_SUGGESTION_LIMIT '{raw}'"))?,
            None => DEFAULT_GUEST_SUGGESTION_LIMIT,
        };
        let framing = match env_string("LINGO_FRAMING") {
            Some(raw) => FramingStrategy::parse(&raw)
                .with_context(|| format!("invalid LINGO_FRAMING '{raw}'"))?,
            None => FramingStrategy::default(),
        };
        let api_tokens = env_string("LINGO_API_TOKENS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_key: env_string("GEMINI_API_KEY"),
            model: env_string("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: env_string("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            bind_addr: env_string("LINGO_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            guest_suggestion_limit,
            api_tokens,
            framing,
            debug_payload: env_flag("LINGO_DEBUG_PAYLOAD").unwrap_or(false),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid GEMINI_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !is_local_endpoint_url(&self.api_url) && self.api_key.is_none() {
            bail!(
                "GEMINI_API_KEY must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if !is_valid_model_name(&self.model) {
            bail!("Invalid model name: '{}'", self.model);
        }

        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid LINGO_BIND_ADDR '{}'", self.bind_addr))
    }
}

/// Consumer-side configuration for the `lingo` CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub refresh_url: Option<String>,
    pub history_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn load() -> Self {
        Self {
            server_url: env_string("LINGO_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            access_token: env_string("LINGO_ACCESS_TOKEN"),
            refresh_token: env_string("LINGO_REFRESH_TOKEN"),
            refresh_url: env_string("LINGO_REFRESH_URL"),
            history_path: env_string("LINGO_HISTORY_PATH").map(PathBuf::from),
        }
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.server_url.trim_end_matches('/'))
    }
}

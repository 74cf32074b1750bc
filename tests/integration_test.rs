use lingostream::config::Config;
use lingostream::server::FramingStrategy;
use std::collections::HashSet;

fn config(api_key: Option<&str>, api_url: &str, model: &str) -> Config {
    Config {
        api_key: api_key.map(str::to_string),
        model: model.to_string(),
        api_url: api_url.to_string(),
        bind_addr: "127.0.0.1:8787".to_string(),
        guest_suggestion_limit: 10,
        api_tokens: HashSet::new(),
        framing: FramingStrategy::Tokenizer,
        debug_payload: false,
    }
}

#[test]
fn test_config_validation_rejects_missing_key_for_remote_api() {
    let config = config(
        None,
        "https://generativelanguage.googleapis.com/v1beta",
        "gemini-2.0-flash",
    );
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_allows_local_endpoint_without_api_key() {
    let config = config(None, "http://localhost:9000/v1beta", "gemini-2.0-flash");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_model_with_path() {
    let config = config(
        Some("key"),
        "https://generativelanguage.googleapis.com/v1beta",
        "models/gemini",
    );
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_rejects_bad_bind_addr() {
    let mut config = config(Some("key"), "http://127.0.0.1:9000", "gemini-2.0-flash");
    config.bind_addr = "not-an-addr".to_string();
    assert!(config.validate().is_err());
}

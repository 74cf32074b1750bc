use serde::Serialize;

pub fn emit_debug_payload(request_url: &str, payload: &impl Serialize) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = request_url, payload = %formatted_payload, "upstream payload_request");
}

pub fn emit_sse_parse_error(json_data: &str, parse_error: &serde_json::Error) {
    tracing::warn!(error = %parse_error, data = json_data, "upstream sse_parse_failed");
}

/// Log a consumer-side line that did not parse as a record.
///
/// The framer only emits validated JSON, so reaching this means the framing
/// guarantee was broken upstream (e.g. a value containing `}` under brace
/// scanning). It is a defect, not a user-facing condition.
pub fn emit_framing_defect(line: &str, parse_error: &serde_json::Error) {
    tracing::error!(error = %parse_error, line, "framing defect: unparseable record line");
}

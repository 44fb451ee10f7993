//! Field checks applied before a message reaches the provider.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static TOPIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-_.~%]+$").unwrap());
static ANDROID_TTL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[smh]$").unwrap());

const MIN_DEVICE_TOKEN_LEN: usize = 100;

/// Registration tokens are long and always carry a colon.
pub fn validate_token(token: &str) -> bool {
    token.len() > MIN_DEVICE_TOKEN_LEN && token.contains(':')
}

pub fn validate_topic(topic: &str) -> bool {
    TOPIC_PATTERN.is_match(topic)
}

/// Only a shape check: a topic membership clause joined by a logical operator.
pub fn validate_condition(condition: &str) -> bool {
    condition.contains("in topics") && (condition.contains("&&") || condition.contains("||"))
}

pub fn validate_message_payload(payload: &Value) -> bool {
    let notification = payload.get("notification").filter(|v| is_set(v));
    let data = payload.get("data").filter(|v| is_set(v));
    (notification.is_some() || data.is_some())
        && notification.map_or(true, Value::is_object)
        && data.map_or(true, Value::is_object)
}

pub fn validate_android_config(config: &Value) -> bool {
    if !config.is_object() {
        return false;
    }
    if let Some(priority) = config.get("priority").filter(|v| is_set(v)) {
        if !matches!(priority.as_str(), Some("high") | Some("normal")) {
            return false;
        }
    }
    if let Some(ttl) = config.get("ttl").filter(|v| is_set(v)) {
        if !ttl.as_str().map_or(false, |ttl| ANDROID_TTL_PATTERN.is_match(ttl)) {
            return false;
        }
    }
    config
        .get("notification")
        .filter(|v| is_set(v))
        .map_or(true, Value::is_object)
}

pub fn validate_apns_config(config: &Value) -> bool {
    if !config.is_object() {
        return false;
    }
    ["headers", "payload"].iter().all(|field| {
        config
            .get(*field)
            .filter(|v| is_set(v))
            .map_or(true, Value::is_object)
    })
}

/// True when `raw` parses to a JSON object or array.
pub fn validate_json_format(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw)
        .map(|parsed| parsed.is_object() || parsed.is_array())
        .unwrap_or(false)
}

// null, false, 0 and "" behave as absent
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        _ => true,
    }
}

//! Small shared helpers: ids and timestamps

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new opaque id for experiments, goals, blockers, etc.
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Current wall-clock timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Current timestamp in milliseconds since the Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Validate a Prometheus-style metric or label name
pub fn validate_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        .unwrap_or(false);
    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

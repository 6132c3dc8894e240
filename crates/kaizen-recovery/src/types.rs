//! Data shapes for the failure recovery core (C9)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    Exponential,
    Linear,
    Fixed,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
    pub jitter: bool,
    pub circuit_breaker_threshold: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            strategy: BackoffStrategy::Exponential,
            jitter: false,
            circuit_breaker_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Permanent,
    Transient,
}

const PERMANENT_MARKERS: &[&str] = &[
    "invalid credentials",
    "unauthorized",
    "forbidden",
    "not found",
    "bad request",
    "invalid",
];

/// Classifies an error message as permanent (not worth retrying) or
/// transient, by case-insensitive substring match.
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if PERMANENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ErrorClass::Permanent
    } else {
        ErrorClass::Transient
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
}

/// One recorded attempt of an `executeWithRetry` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub operation_id: String,
    pub attempt_count: u32,
    pub succeeded: bool,
    pub error_class: Option<ErrorClass>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetryStats {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub total_retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_known_permanent_markers() {
        assert_eq!(classify("Unauthorized: token expired"), ErrorClass::Permanent);
        assert_eq!(classify("Resource not found"), ErrorClass::Permanent);
        assert_eq!(classify("INVALID request body"), ErrorClass::Permanent);
    }

    #[test]
    fn classify_defaults_to_transient() {
        assert_eq!(classify("connection reset by peer"), ErrorClass::Transient);
        assert_eq!(classify("timeout waiting for upstream"), ErrorClass::Transient);
    }
}

//! `executeWithRetry` state machine: retries a transient operation with
//! backoff, tracks a per-operation circuit breaker, and keeps an
//! append-only attempt history.

use crate::circuit::Circuit;
use crate::delay::calculate_delay;
use crate::types::{classify, AttemptRecord, ErrorClass, RetryConfig, RetryStats};
use kaizen_common::{current_timestamp, Error, Result};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::warn;

pub struct RetryExecutor {
    config: RetryConfig,
    circuits: RwLock<HashMap<String, Circuit>>,
    history: RwLock<Vec<AttemptRecord>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Runs `op` under the configured retry/backoff policy, keyed by
    /// `id` for circuit-breaker bookkeeping. `op` receives the 0-based
    /// attempt index and must produce `Err` with a message that
    /// [`classify`] can read.
    ///
    /// One [`AttemptRecord`] is appended to history per call to this
    /// method (not per underlying attempt): `attempt_count` carries how
    /// many attempts this call took, so `totalRetries = Σ(attemptCount-1)`
    /// reflects retries-per-operation rather than raw attempt counts.
    pub async fn execute_with_retry<F, Fut, T>(&self, id: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, String>>,
    {
        if self.is_open(id).await {
            return Err(Error::CircuitOpen(id.to_string()));
        }

        for attempt in 0..=self.config.max_retries {
            match op(attempt).await {
                Ok(value) => {
                    self.record(id, attempt + 1, true, None).await;
                    self.on_success(id).await;
                    return Ok(value);
                }
                Err(message) => {
                    let class = classify(&message);
                    let is_last = attempt == self.config.max_retries;
                    if class == ErrorClass::Permanent || is_last {
                        self.record(id, attempt + 1, false, Some(class)).await;
                        self.on_failure(id).await;
                        let err = match class {
                            ErrorClass::Permanent => Error::Permanent(message),
                            ErrorClass::Transient => Error::Transient(message),
                        };
                        return Err(err);
                    }
                    self.on_failure(id).await;
                    let delay = calculate_delay(attempt + 1, &self.config);
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        // Unreachable: attempt == self.config.max_retries is always
        // `is_last` on the final loop iteration, which always returns above.
        warn!(operation = id, "retry loop exhausted without a terminal branch");
        Err(Error::Internal(format!("{id}: retry loop exhausted unexpectedly")))
    }

    async fn is_open(&self, id: &str) -> bool {
        self.circuits
            .read()
            .await
            .get(id)
            .map(|c| c.is_open())
            .unwrap_or(false)
    }

    async fn on_success(&self, id: &str) {
        let mut circuits = self.circuits.write().await;
        circuits.entry(id.to_string()).or_default().record_success();
    }

    async fn on_failure(&self, id: &str) {
        let mut circuits = self.circuits.write().await;
        circuits
            .entry(id.to_string())
            .or_default()
            .record_failure(self.config.circuit_breaker_threshold);
    }

    async fn record(&self, id: &str, attempt_count: u32, succeeded: bool, error_class: Option<ErrorClass>) {
        self.history.write().await.push(AttemptRecord {
            operation_id: id.to_string(),
            attempt_count,
            succeeded,
            error_class,
            recorded_at: current_timestamp(),
        });
    }

    pub async fn history(&self) -> Vec<AttemptRecord> {
        self.history.read().await.clone()
    }

    pub async fn stats(&self) -> RetryStats {
        let history = self.history.read().await;
        let total = history.len() as u64;
        let successes = history.iter().filter(|a| a.succeeded).count() as u64;
        let failures = total - successes;
        let total_retries: u64 = history.iter().map(|a| (a.attempt_count - 1) as u64).sum();
        RetryStats {
            total,
            successes,
            failures,
            success_rate: if total == 0 { 0.0 } else { successes as f64 / total as f64 },
            total_retries,
        }
    }

    pub async fn is_circuit_open(&self, id: &str) -> bool {
        self.is_open(id).await
    }
}

//! Predicate engine: evaluates a metric snapshot against configured
//! bounds and classifies violations by severity (C2).

use crate::types::{BoundSpec, Severity, ValidationResult, Violation};
use crate::SafetyEvent;
use kaizen_common::current_timestamp;
use kaizen_metrics::MetricSnapshot;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

const CRASH_RATE: &str = "crashRate";
const CHECKPOINT_TIME: &str = "checkpointTime";
const RESUME_SUCCESS_RATE: &str = "resumeSuccessRate";
const RESTART_TIME: &str = "restartTime";
const TOKEN_COST: &str = "tokenCost";

const CRASH_RATE_METRIC: &str = "shim_crash_prediction_accuracy";
const CHECKPOINT_TIME_METRIC: &str = "shim_checkpoint_creation_time";
const RESUME_SUCCESS_RATE_METRIC: &str = "shim_resume_success_rate";
const RESTART_TIME_METRIC: &str = "shim_supervisor_restart_time";
const TOKEN_COST_BASELINE_METRIC: &str = "shim_token_cost_baseline";
const TOKEN_COST_CURRENT_METRIC: &str = "shim_token_cost_current";

/// Default bound configuration for the five recognized metric keys.
pub fn default_bounds() -> HashMap<String, BoundSpec> {
    let mut bounds = HashMap::new();
    bounds.insert(
        CRASH_RATE.to_string(),
        BoundSpec {
            max: Some(0.10),
            critical: Some(0.25),
            ..Default::default()
        },
    );
    bounds.insert(
        CHECKPOINT_TIME.to_string(),
        BoundSpec {
            max: Some(100.0),
            critical: Some(250.0),
            ..Default::default()
        },
    );
    bounds.insert(
        RESUME_SUCCESS_RATE.to_string(),
        BoundSpec {
            min: Some(0.90),
            critical: Some(0.75),
            ..Default::default()
        },
    );
    bounds.insert(
        RESTART_TIME.to_string(),
        BoundSpec {
            max: Some(5000.0),
            critical: Some(10000.0),
            ..Default::default()
        },
    );
    bounds.insert(
        TOKEN_COST.to_string(),
        BoundSpec {
            max_increase: Some(0.20),
            ..Default::default()
        },
    );
    bounds
}

/// Evaluates typed safety predicates against metric snapshots, emitting
/// violations with severity and a rollback recommendation.
pub struct SafetyBounds {
    bounds: RwLock<HashMap<String, BoundSpec>>,
    events: broadcast::Sender<SafetyEvent>,
}

impl Default for SafetyBounds {
    fn default() -> Self {
        Self::new(default_bounds())
    }
}

impl SafetyBounds {
    pub fn new(bounds: HashMap<String, BoundSpec>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            bounds: RwLock::new(bounds),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SafetyEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SafetyEvent) {
        let _ = self.events.send(event);
    }

    /// Add or replace the bound spec for `key`.
    pub async fn upsert_bound(&self, key: &str, spec: BoundSpec) {
        self.bounds.write().await.insert(key.to_string(), spec);
    }

    /// Remove the bound spec for `key`, if present.
    pub async fn remove_bound(&self, key: &str) {
        self.bounds.write().await.remove(key);
    }

    /// Evaluate every configured bound against `snapshot`.
    pub async fn validate(&self, snapshot: &MetricSnapshot) -> ValidationResult {
        let bounds = self.bounds.read().await;
        let mut violations = Vec::new();

        for (key, spec) in bounds.iter() {
            if let Some(violation) = evaluate_bound(key, spec, snapshot) {
                self.emit(SafetyEvent::Violation(violation.clone()));
                if violation.severity == Severity::Critical {
                    self.emit(SafetyEvent::CriticalViolation(violation.clone()));
                }
                violations.push(violation);
            }
        }

        let result = ValidationResult::from_violations(violations);
        if result.should_rollback {
            self.emit(SafetyEvent::RollbackRecommended(result.clone()));
        }
        result
    }

    /// Same as `validate`, but every violation is annotated with the
    /// evaluated experiment's id.
    pub async fn validate_experiment(
        &self,
        experiment_id: &str,
        snapshot: &MetricSnapshot,
    ) -> ValidationResult {
        let mut result = self.validate(snapshot).await;
        for violation in &mut result.violations {
            violation.experiment_id = Some(experiment_id.to_string());
        }
        result
    }

    /// Human-readable remediation report for a validation result.
    pub fn generate_report(&self, result: &ValidationResult) -> String {
        if result.violations.is_empty() {
            return "No safety violations detected.".to_string();
        }
        let mut report = String::new();
        for violation in &result.violations {
            let tag = match violation.severity {
                Severity::Warning => "WARNING",
                Severity::Critical => "CRITICAL",
            };
            report.push_str(&format!(
                "[{tag}] {message}\n  current: {current}\n  threshold: {threshold}\n  remediation: {remediation}\n\n",
                tag = tag,
                message = violation.message,
                current = violation.current_value,
                threshold = violation.threshold,
                remediation = remediation_for(&violation.bound_type),
            ));
        }
        if result.should_rollback {
            report.push_str(&format!(
                "Rollback recommended: {}\n",
                result.rollback_reason.as_deref().unwrap_or("")
            ));
        }
        report
    }
}

fn remediation_for(bound_type: &str) -> &'static str {
    match bound_type {
        CRASH_RATE => "Reduce checkpoint interval or improve model robustness to lower predicted crash rate.",
        CHECKPOINT_TIME => "Investigate checkpoint serialization overhead; consider incremental checkpointing.",
        RESUME_SUCCESS_RATE => "Review resume-path error logs; validate checkpoint integrity before resume.",
        RESTART_TIME => "Profile the supervisor restart sequence; consider lazy-loading non-critical subsystems.",
        TOKEN_COST => "Audit recent routing changes; consider reverting to the prior model-selection policy.",
        _ => "Review recent configuration changes affecting this metric.",
    }
}

/// Derives the bound-specific value from the snapshot and classifies a
/// violation, if any, per the table in the design spec.
fn evaluate_bound(key: &str, spec: &BoundSpec, snapshot: &MetricSnapshot) -> Option<Violation> {
    match key {
        CRASH_RATE => {
            let accuracy = snapshot.gauge(CRASH_RATE_METRIC)?;
            let derived = 1.0 - accuracy;
            max_violation(key, derived, spec)
        }
        CHECKPOINT_TIME => {
            let hist = snapshot.histogram(CHECKPOINT_TIME_METRIC)?;
            let avg = hist.average()?;
            max_violation(key, avg, spec)
        }
        RESUME_SUCCESS_RATE => {
            let value = snapshot.gauge(RESUME_SUCCESS_RATE_METRIC)?;
            min_violation(key, value, spec)
        }
        RESTART_TIME => {
            let hist = snapshot.histogram(RESTART_TIME_METRIC)?;
            let avg = hist.average()?;
            max_violation(key, avg, spec)
        }
        TOKEN_COST => {
            let baseline = snapshot.gauge(TOKEN_COST_BASELINE_METRIC)?;
            let current = snapshot.gauge(TOKEN_COST_CURRENT_METRIC)?;
            if baseline <= 0.0 || current <= baseline {
                // cost decreases (or no baseline) never violate
                return None;
            }
            let ratio = (current - baseline) / baseline;
            let max_increase = spec.max_increase?;
            if ratio <= max_increase {
                return None;
            }
            let critical_threshold = spec.critical.unwrap_or(max_increase * 1.5);
            let severity = if ratio > critical_threshold {
                Severity::Critical
            } else {
                Severity::Warning
            };
            Some(Violation {
                bound_type: key.to_string(),
                current_value: ratio,
                threshold: max_increase,
                severity,
                message: format!(
                    "tokenCost increased {:.1}% over baseline, exceeding the {:.1}% bound",
                    ratio * 100.0,
                    max_increase * 100.0
                ),
                experiment_id: None,
                detected_at: current_timestamp(),
            })
        }
        // Custom runtime-registered keys: treat the key itself as a gauge name.
        _ => {
            let value = snapshot.gauge(key)?;
            if spec.max.is_some() {
                max_violation(key, value, spec)
            } else if spec.min.is_some() {
                min_violation(key, value, spec)
            } else {
                None
            }
        }
    }
}

fn max_violation(key: &str, value: f64, spec: &BoundSpec) -> Option<Violation> {
    let max = spec.max?;
    if value <= max {
        return None;
    }
    let severity = match spec.critical {
        Some(critical) if value > critical => Severity::Critical,
        _ => Severity::Warning,
    };
    Some(Violation {
        bound_type: key.to_string(),
        current_value: value,
        threshold: max,
        severity,
        message: format!("{key} of {value:.4} exceeds maximum of {max:.4}"),
        experiment_id: None,
        detected_at: current_timestamp(),
    })
}

fn min_violation(key: &str, value: f64, spec: &BoundSpec) -> Option<Violation> {
    let min = spec.min?;
    if value >= min {
        return None;
    }
    let severity = match spec.critical {
        Some(critical) if value < critical => Severity::Critical,
        _ => Severity::Warning,
    };
    Some(Violation {
        bound_type: key.to_string(),
        current_value: value,
        threshold: min,
        severity,
        message: format!("{key} of {value:.4} is below minimum of {min:.4}"),
        experiment_id: None,
        detected_at: current_timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaizen_metrics::MetricRegistry;

    fn snapshot_with_accuracy(accuracy: f64) -> MetricSnapshot {
        let registry = MetricRegistry::new();
        registry.register_gauge(CRASH_RATE_METRIC, "accuracy").unwrap();
        registry.observe_gauge(CRASH_RATE_METRIC, accuracy).unwrap();
        registry.snapshot()
    }

    #[tokio::test]
    async fn no_regression_passes() {
        let bounds = SafetyBounds::default();
        let snapshot = snapshot_with_accuracy(0.95);
        let result = bounds.validate(&snapshot).await;
        assert!(result.passed);
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn critical_crash_rate_triggers_rollback() {
        let bounds = SafetyBounds::default();
        // accuracy 0.70 -> crashRate derived 0.30, threshold max 0.10, critical 0.25
        let snapshot = snapshot_with_accuracy(0.70);
        let result = bounds.validate(&snapshot).await;
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].bound_type, CRASH_RATE);
        assert_eq!(result.violations[0].severity, Severity::Critical);
        assert!((result.violations[0].current_value - 0.30).abs() < 1e-9);
        assert!(result.should_rollback);
    }

    #[tokio::test]
    async fn exactly_two_warnings_trigger_rollback() {
        let registry = MetricRegistry::new();
        registry.register_gauge(CRASH_RATE_METRIC, "accuracy").unwrap();
        registry.observe_gauge(CRASH_RATE_METRIC, 0.85).unwrap(); // derived 0.15 -> warning
        registry.register_gauge(RESUME_SUCCESS_RATE_METRIC, "resume").unwrap();
        registry.observe_gauge(RESUME_SUCCESS_RATE_METRIC, 0.80).unwrap(); // below 0.90 -> warning
        let snapshot = registry.snapshot();

        let bounds = SafetyBounds::default();
        let result = bounds.validate(&snapshot).await;
        assert_eq!(result.violations.len(), 2);
        assert!(result.violations.iter().all(|v| v.severity == Severity::Warning));
        assert!(result.should_rollback);
    }

    #[tokio::test]
    async fn validate_experiment_annotates_violations() {
        let bounds = SafetyBounds::default();
        let snapshot = snapshot_with_accuracy(0.70);
        let result = bounds.validate_experiment("exp-1", &snapshot).await;
        assert_eq!(result.violations[0].experiment_id.as_deref(), Some("exp-1"));
    }

    #[tokio::test]
    async fn token_cost_decrease_never_violates() {
        let registry = MetricRegistry::new();
        registry.register_gauge(TOKEN_COST_BASELINE_METRIC, "baseline").unwrap();
        registry.observe_gauge(TOKEN_COST_BASELINE_METRIC, 100.0).unwrap();
        registry.register_gauge(TOKEN_COST_CURRENT_METRIC, "current").unwrap();
        registry.observe_gauge(TOKEN_COST_CURRENT_METRIC, 80.0).unwrap();
        let snapshot = registry.snapshot();

        let bounds = SafetyBounds::default();
        let result = bounds.validate(&snapshot).await;
        assert!(result.passed);
    }
}

//! Data shapes for the safety bounds evaluator (C2)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-metric-kind thresholds. A bound is either a `max` bound, a `min`
/// bound, or (for ratio-style metrics like token cost) a `max_increase`
/// bound relative to a baseline; `critical` optionally sharpens severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundSpec {
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub max_increase: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub bound_type: String,
    pub current_value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    pub experiment_id: Option<String>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub should_rollback: bool,
    pub rollback_reason: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
            should_rollback: false,
            rollback_reason: None,
        }
    }

    /// Builds a result from a set of violations, applying the rollback
    /// rule: `shouldRollback ⇔ (∃ critical violation) ∨ (|violations| ≥ 2)`.
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let critical_count = violations.iter().filter(|v| v.severity == Severity::Critical).count();
        let should_rollback = critical_count >= 1 || violations.len() >= 2;
        let rollback_reason = if should_rollback {
            Some(
                violations
                    .iter()
                    .map(|v| v.bound_type.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        } else {
            None
        };
        Self {
            passed: violations.is_empty(),
            should_rollback,
            rollback_reason,
            violations,
        }
    }
}

/// Events emitted by the safety evaluator (spec.md §6: "Safety bounds
/// engine emits: violation(v), critical_violation(v),
/// rollback_recommended(result)").
#[derive(Debug, Clone)]
pub enum SafetyEvent {
    Violation(Violation),
    CriticalViolation(Violation),
    RollbackRecommended(ValidationResult),
}

//! Data shapes for the experimentation backend adapter (C4)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentState {
    Created,
    Running,
    Stopped,
    Deployed,
    RolledBack,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub value: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub control: Variant,
    pub treatment: Variant,
    pub success_metrics: Vec<String>,
    pub hypothesis: String,
    pub created_at: DateTime<Utc>,
    pub state: ExperimentState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Control,
    Treatment,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmResult {
    pub sample_size: u64,
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub control: ArmResult,
    pub treatment: ArmResult,
    pub is_significant: bool,
    pub p_value: f64,
    pub winner: Winner,
    pub error: Option<String>,
}

impl ExperimentResult {
    /// Default, non-significant result returned by the reference
    /// statistical-significance model.
    pub fn inconclusive() -> Self {
        Self {
            control: ArmResult::default(),
            treatment: ArmResult::default(),
            is_significant: false,
            p_value: 1.0,
            winner: Winner::None,
            error: None,
        }
    }
}

/// `getVariant` response: the assigned variant name and its cached value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantAssignment {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub deployed: bool,
    pub variant: Option<String>,
    pub previous_value: Option<f64>,
    pub new_value: Option<f64>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl DeployOutcome {
    pub fn not_deployed(reason: impl Into<String>) -> Self {
        Self {
            deployed: false,
            variant: None,
            previous_value: None,
            new_value: None,
            deployed_at: None,
            reason: Some(reason.into()),
        }
    }
}

/// A proposed experiment, produced by the opportunity detector and
/// handed to `createExperiment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentProposal {
    pub name: String,
    pub control_value: f64,
    pub treatment_value: f64,
    pub control_description: Option<String>,
    pub treatment_description: Option<String>,
    pub success_metrics: Vec<String>,
    pub hypothesis: String,
}

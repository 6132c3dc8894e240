//! Data shapes for the opportunity detector (C3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum OpportunityType {
    CheckpointIntervalOptimization,
    CheckpointPerformance,
    ResumeReliability,
    ModelRoutingOptimization,
    TokenOptimization,
    SupervisorPerformance,
    MonitorLatency,
}

impl OpportunityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::CheckpointIntervalOptimization => "checkpoint_interval_optimization",
            OpportunityType::CheckpointPerformance => "checkpoint_performance",
            OpportunityType::ResumeReliability => "resume_reliability",
            OpportunityType::ModelRoutingOptimization => "model_routing_optimization",
            OpportunityType::TokenOptimization => "token_optimization",
            OpportunityType::SupervisorPerformance => "supervisor_performance",
            OpportunityType::MonitorLatency => "monitor_latency",
        }
    }

    /// Static success-metric table used when exporting to the
    /// experimentation backend.
    pub fn success_metrics(&self) -> &'static [&'static str] {
        match self {
            OpportunityType::CheckpointIntervalOptimization => {
                &["crash_prediction_accuracy", "checkpoint_creation_time"]
            }
            OpportunityType::CheckpointPerformance => {
                &["checkpoint_creation_time", "checkpoint_success_rate"]
            }
            OpportunityType::ResumeReliability => &["resume_success_rate", "resume_latency"],
            OpportunityType::ModelRoutingOptimization => {
                &["model_routing_accuracy", "token_cost_per_request"]
            }
            OpportunityType::TokenOptimization => &["token_cost_total", "response_quality_score"],
            OpportunityType::SupervisorPerformance => {
                &["supervisor_restart_time", "supervisor_restart_success_rate"]
            }
            OpportunityType::MonitorLatency => &["monitor_latency", "monitor_overhead_ratio"],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    #[serde(rename = "type")]
    pub opportunity_type: OpportunityType,
    pub pattern: String,
    pub hypothesis: String,
    pub confidence: f64,
    pub impact: String,
    pub current_value: f64,
    pub proposed_value: f64,
    pub estimated_savings: f64,
    pub sample_size: u64,
    pub detected_at: DateTime<Utc>,
}

/// A candidate experiment scaffold ready for the experimentation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentScaffold {
    pub name: String,
    pub control: VariantScaffold,
    pub treatment: VariantScaffold,
    pub success_metrics: Vec<String>,
    pub hypothesis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantScaffold {
    pub value: f64,
    pub description: String,
}

impl Opportunity {
    /// Maps this opportunity onto an experiment scaffold per the static
    /// success-metric table keyed by opportunity type.
    pub fn to_scaffold(&self, now_millis: u64) -> ExperimentScaffold {
        ExperimentScaffold {
            name: format!("{}_{}", self.opportunity_type.as_str(), now_millis),
            control: VariantScaffold {
                value: self.current_value,
                description: "Current configuration".to_string(),
            },
            treatment: VariantScaffold {
                value: self.proposed_value,
                description: self.hypothesis.clone(),
            },
            success_metrics: self
                .opportunity_type
                .success_metrics()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hypothesis: self.hypothesis.clone(),
        }
    }
}

/// One entry in pattern memory, keyed externally by pattern text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMemoryEntry {
    pub pattern: String,
    pub first_detected: DateTime<Utc>,
    pub last_detected: DateTime<Utc>,
    pub count: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub min_confidence: f64,
    pub min_impact: f64,
    pub min_sample_size: u64,
    pub pattern_expiry_time_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            min_impact: 0.0,
            min_sample_size: 10,
            pattern_expiry_time_ms: 24 * 60 * 60 * 1000,
        }
    }
}

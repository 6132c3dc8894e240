//! Data shapes for the Kaizen engine (C5): the central control plane
//! tying detection, safety and experimentation together over three
//! independently-timed cycles.

use chrono::{DateTime, Utc};
use kaizen_detector::Opportunity;
use kaizen_experiments::{DeployOutcome, Experiment};
use kaizen_safety::Violation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub detection_interval_ms: i64,
    pub min_sample_size: u64,
    pub max_concurrent_experiments: usize,
    pub deployment_threshold: f64,
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 60_000,
            min_sample_size: 10,
            max_concurrent_experiments: 5,
            deployment_threshold: 0.95,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Stopped,
}

/// Events emitted over the engine's broadcast channel, one per cycle
/// milestone (spec.md §6: detection/safety/progress cycle events plus
/// lifecycle and error events).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Started,
    Stopped,
    Paused,
    Resumed,
    DetectionCycle,
    DetectionSkipped(String),
    OpportunitiesDetected(Vec<Opportunity>),
    ExperimentCreated(Experiment),
    ExperimentRejected { opportunity: Opportunity, reason: String },
    MaxExperimentsReached,
    SafetyCheck,
    SafetyViolation(Vec<Violation>),
    AutoRollback { experiment: String, reason: String },
    ProgressCheck,
    ProgressUpdate(Vec<ExperimentStatus>),
    AutoDeployed(DeployOutcome),
    DeploymentRejected { experiment: String, reason: String },
    Error { phase: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentPhase {
    Active,
    Completed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentStatus {
    pub name: String,
    pub phase: ExperimentPhase,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub detection_cycles: u64,
    pub safety_cycles: u64,
    pub progress_cycles: u64,
    pub opportunities_detected: u64,
    pub experiments_created: u64,
    pub experiments_rejected: u64,
    pub rollbacks: u64,
    pub deployments: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: EngineState,
    pub paused: bool,
    pub stats: EngineStats,
    pub active_experiments: usize,
    pub completed_experiments: usize,
    pub rolledback_experiments: usize,
    pub last_detection_cycle: Option<DateTime<Utc>>,
    pub last_safety_check: Option<DateTime<Utc>>,
    pub last_progress_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub completed_experiments: Vec<Experiment>,
    pub total_deployed: u64,
    pub total_rolled_back: u64,
}

/// ROI summary. The baseline-vs-current computation is a hook: absent
/// supplied baselines, every field defaults to zero (spec.md §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoiReport {
    pub crash_reduction: f64,
    pub performance_gain: f64,
    pub token_savings: f64,
}

/// Optional baselines consumed by `calculate_roi`; when absent the
/// report is all zeros.
#[derive(Debug, Clone, Default)]
pub struct RoiBaseline {
    pub baseline_crash_rate: Option<f64>,
    pub current_crash_rate: Option<f64>,
    pub baseline_latency_ms: Option<f64>,
    pub current_latency_ms: Option<f64>,
    pub baseline_token_cost: Option<f64>,
    pub current_token_cost: Option<f64>,
}

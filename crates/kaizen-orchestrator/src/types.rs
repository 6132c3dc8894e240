//! Data shapes for the autonomous orchestrator (C8).

use chrono::{DateTime, Utc};
use kaizen_goals::Goal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestratorState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub execution_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            execution_interval_ms: 100,
        }
    }
}

/// Per-`start()` options: an optional cap on the number of cycles to run
/// before the orchestrator stops itself.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub state: OrchestratorState,
    pub current_goal_id: Option<String>,
    pub cycles_completed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_ms: i64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// The goal currently being driven by the orchestrator, plus the
/// `maxCycles` cap for this run (if any).
#[derive(Debug, Clone)]
pub struct ActiveGoal {
    pub goal: Goal,
    pub max_cycles: Option<u64>,
}

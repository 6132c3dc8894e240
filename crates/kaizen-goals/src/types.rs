//! Data shapes shared by the goal decomposer and the progress tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum GoalType {
    Development,
    Testing,
    Documentation,
    Deployment,
    Optimization,
    Quality,
    Workflow,
    Process,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalConstraints {
    pub max_hours: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
    pub resources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub goal_type: GoalType,
    pub priority: u8,
    pub constraints: Option<GoalConstraints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGoal {
    pub id: String,
    pub description: String,
    pub priority: u8,
    pub estimated_hours: f64,
    pub success_criteria: Vec<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub goal_id: String,
    pub subgoals: Vec<SubGoal>,
    pub dependencies: HashMap<String, Vec<String>>,
    pub total_estimated_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubGoalStatus {
    Pending,
    InProgress,
    Complete,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGoalState {
    pub status: SubGoalStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub blocker: Option<Blocker>,
}

impl Default for SubGoalState {
    fn default() -> Self {
        Self {
            status: SubGoalStatus::Pending,
            completed_at: None,
            blocker: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub target_percentage: u8,
    pub achieved: bool,
    pub achieved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    pub goal_id: String,
    pub decomposition: Decomposition,
    pub subgoal_states: HashMap<String, SubGoalState>,
    pub milestones: Vec<Milestone>,
    pub completion_log: Vec<(String, DateTime<Utc>)>,
    pub tracking_started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub completion_percentage: u8,
    pub velocity: f64,
    pub estimated_hours_remaining: f64,
}

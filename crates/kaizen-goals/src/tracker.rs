//! Progress tracker: per-goal subgoal state, milestones and velocity (C7).

use crate::types::{
    Blocker, Decomposition, Milestone, Progress, ProgressState, Severity, SubGoalState,
    SubGoalStatus,
};
use kaizen_common::{generate_id, Clock, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_MILESTONES: &[u8] = &[25, 50, 75, 100];

pub struct ProgressTracker {
    clock: Arc<dyn Clock>,
    states: RwLock<HashMap<String, ProgressState>>,
}

impl ProgressTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn start_tracking(
        &self,
        goal_id: &str,
        decomposition: Decomposition,
        milestones: Option<Vec<u8>>,
    ) -> Result<()> {
        let mut states = self.states.write().await;
        if states.contains_key(goal_id) {
            return Err(Error::InvalidInput(format!(
                "progress tracking already started for goal {goal_id}"
            )));
        }
        let now = self.clock.now();
        let subgoal_states = decomposition
            .subgoals
            .iter()
            .map(|s| (s.id.clone(), SubGoalState::default()))
            .collect();
        let milestone_targets = milestones.unwrap_or_else(|| DEFAULT_MILESTONES.to_vec());
        states.insert(
            goal_id.to_string(),
            ProgressState {
                goal_id: goal_id.to_string(),
                decomposition,
                subgoal_states,
                milestones: milestone_targets
                    .into_iter()
                    .map(|target| Milestone {
                        target_percentage: target,
                        achieved: false,
                        achieved_at: None,
                    })
                    .collect(),
                completion_log: Vec::new(),
                tracking_started_at: now,
            },
        );
        Ok(())
    }

    pub async fn update_subgoal(
        &self,
        goal_id: &str,
        subgoal_id: &str,
        status: SubGoalStatus,
        severity: Option<Severity>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut states = self.states.write().await;
        let state = states
            .get_mut(goal_id)
            .ok_or_else(|| Error::NotFound(format!("no tracked progress for goal {goal_id}")))?;

        let subgoal_state = state
            .subgoal_states
            .get_mut(subgoal_id)
            .ok_or_else(|| Error::NotFound(format!("no subgoal {subgoal_id} in goal {goal_id}")))?;

        let first_completion = status == SubGoalStatus::Complete && subgoal_state.completed_at.is_none();

        subgoal_state.status = status;
        if first_completion {
            subgoal_state.completed_at = Some(now);
            state.completion_log.push((subgoal_id.to_string(), now));
        }

        if status == SubGoalStatus::Blocked {
            let description = state
                .decomposition
                .subgoals
                .iter()
                .find(|s| s.id == subgoal_id)
                .map(|s| s.description.clone())
                .unwrap_or_default();
            state.subgoal_states.get_mut(subgoal_id).unwrap().blocker = Some(Blocker {
                id: format!("blocker-{subgoal_id}-{}", now.timestamp_millis()),
                severity: severity.unwrap_or(Severity::Medium),
                description,
                detected_at: now,
            });
        } else {
            state.subgoal_states.get_mut(subgoal_id).unwrap().blocker = None;
        }

        let completion_pct = completion_percentage(state);
        for milestone in &mut state.milestones {
            if !milestone.achieved && milestone.target_percentage as f64 <= completion_pct {
                milestone.achieved = true;
                milestone.achieved_at = Some(now);
            }
        }

        Ok(())
    }

    pub async fn get_progress(&self, goal_id: &str) -> Result<Progress> {
        let states = self.states.read().await;
        let state = states
            .get(goal_id)
            .ok_or_else(|| Error::NotFound(format!("no tracked progress for goal {goal_id}")))?;

        let total = state.subgoal_states.len();
        let completed = completed_count(state);
        let completion_percentage = completion_percentage(state).round() as u8;

        let now = self.clock.now();
        let elapsed_hours = (now - state.tracking_started_at).num_milliseconds() as f64 / 3_600_000.0;
        let velocity = if completed == 0 || elapsed_hours <= 0.0 {
            0.0
        } else {
            completed as f64 / elapsed_hours
        };

        let remaining = (total - completed) as f64;
        let estimated_hours_remaining = if velocity == 0.0 {
            f64::INFINITY
        } else {
            remaining / velocity
        };

        Ok(Progress {
            completion_percentage,
            velocity,
            estimated_hours_remaining,
        })
    }

    pub async fn estimate_completion(&self, goal_id: &str) -> Result<chrono::DateTime<chrono::Utc>> {
        let progress = self.get_progress(goal_id).await?;
        let now = self.clock.now();
        if progress.completion_percentage >= 100 {
            return Ok(now);
        }
        if progress.velocity == 0.0 {
            return Ok(now + chrono::Duration::days(365));
        }
        let hours = progress.estimated_hours_remaining;
        Ok(now + chrono::Duration::milliseconds((hours * 3_600_000.0) as i64))
    }

    /// A clone of the full tracked state for `goal_id`, used by callers
    /// (the orchestrator's cycle) that need to walk the dependency graph
    /// alongside per-subgoal status.
    pub async fn snapshot(&self, goal_id: &str) -> Result<ProgressState> {
        self.states
            .read()
            .await
            .get(goal_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no tracked progress for goal {goal_id}")))
    }

    pub async fn is_blocked(&self, goal_id: &str) -> Result<bool> {
        let states = self.states.read().await;
        let state = states
            .get(goal_id)
            .ok_or_else(|| Error::NotFound(format!("no tracked progress for goal {goal_id}")))?;
        Ok(state
            .subgoal_states
            .values()
            .any(|s| s.status == SubGoalStatus::Blocked))
    }
}

fn completed_count(state: &ProgressState) -> usize {
    state
        .subgoal_states
        .values()
        .filter(|s| s.status == SubGoalStatus::Complete)
        .count()
}

fn completion_percentage(state: &ProgressState) -> f64 {
    let total = state.subgoal_states.len();
    if total == 0 {
        return 0.0;
    }
    100.0 * completed_count(state) as f64 / total as f64
}

//! Goal decomposition (C6) and progress tracking (C7)

pub mod decomposer;
pub mod templates;
pub mod tracker;
pub mod types;

pub use decomposer::{has_circular_dependencies, topological_sort, Decomposer};
pub use tracker::ProgressTracker;
pub use types::{
    Blocker, Decomposition, Goal, GoalConstraints, GoalType, Milestone, Progress, ProgressState,
    Severity, SubGoal, SubGoalState, SubGoalStatus,
};

//! Autonomous orchestrator: cycle scheduler driving goal decomposition
//! and progress tracking (C8)

pub mod orchestrator;
pub mod types;

pub use orchestrator::AutonomousOrchestrator;
pub use types::{ActiveGoal, OrchestratorConfig, OrchestratorState, OrchestratorStatus, StartOptions};

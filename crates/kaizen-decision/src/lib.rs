//! Decision engine: confidence and risk scoring for autonomous choices (C10)

pub mod engine;
pub mod types;

pub use engine::DecisionEngine;
pub use types::{Decision, DecisionConfig, DecisionContext, DecisionFilter, RiskLevel};

//! Opportunity detector and pattern memory (C3)
//!
//! Runs fixed detector policies against a metric snapshot, filters and
//! ranks the surfaced opportunities, and maps them onto experiment
//! scaffolds for the experimentation backend.

pub mod detector;
pub mod memory;
pub mod policies;
pub mod types;

pub use detector::OpportunityDetector;
pub use memory::PatternMemory;
pub use policies::confidence_from_samples;
pub use types::{DetectorConfig, ExperimentScaffold, Opportunity, OpportunityType, PatternMemoryEntry};

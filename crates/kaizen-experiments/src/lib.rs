//! Experimentation backend adapter contract and reference implementation (C4)

pub mod backend;
pub mod in_memory;
pub mod types;

pub use backend::ExperimentBackend;
pub use in_memory::InMemoryExperimentBackend;
pub use types::{
    ArmResult, DeployOutcome, Experiment, ExperimentProposal, ExperimentResult, ExperimentState,
    Variant, VariantAssignment, Winner,
};

//! The Kaizen engine (C5): the central control plane running three
//! independently-timed cycles over the detector, safety evaluator and
//! experimentation backend.

pub mod engine;
pub mod types;

pub use engine::KaizenEngine;
pub use types::{
    EngineConfig, EngineEvent, EngineStats, EngineState, ExperimentPhase, ExperimentStatus,
    ImprovementReport, RoiBaseline, RoiReport, StatusReport,
};

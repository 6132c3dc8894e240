//! Safety bounds evaluator (C2)
//!
//! Validates metric snapshots against configured bounds, classifies
//! violations by severity and decides when a rollback is warranted.

pub mod bounds;
pub mod types;

pub use bounds::{default_bounds, SafetyBounds};
pub use types::{BoundSpec, Severity, ValidationResult, Violation};

/// Events emitted by [`SafetyBounds`] as it evaluates snapshots.
pub use types::SafetyEvent;

//! Shared types and utilities for the Kaizen control plane
//!
//! This crate provides the error type, id/timestamp helpers and clock
//! abstraction used across every other `kaizen-*` crate.

pub mod clock;
pub mod error;
pub mod utils;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{Error, Result};
pub use utils::{current_timestamp, current_timestamp_ms, generate_id, validate_metric_name};

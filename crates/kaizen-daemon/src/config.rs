//! Top-level configuration tree for the daemon process.
//!
//! Aggregates every component's own config struct behind one
//! `#[derive(Serialize, Deserialize)]` tree with an `impl Default`,
//! mirroring `mcp_common::config::Config`'s nested-struct shape. Lives
//! here rather than in `kaizen-common` since it names every component
//! crate's config type and `kaizen-common` must stay a leaf dependency.

use kaizen_decision::DecisionConfig;
use kaizen_detector::DetectorConfig;
use kaizen_engine::EngineConfig;
use kaizen_orchestrator::OrchestratorConfig;
use kaizen_recovery::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    pub http_enabled: bool,
    pub port: u16,
}

impl MetricsConfig {
    fn defaults() -> Self {
        Self {
            http_enabled: true,
            port: kaizen_metrics::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub engine: EngineConfig,
    pub detector: DetectorConfig,
    pub orchestrator: OrchestratorConfig,
    pub recovery: RetryConfig,
    pub decision: DecisionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig::defaults(),
            engine: EngineConfig::default(),
            detector: DetectorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            recovery: RetryConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to
    /// `Config::default()` when `path` doesn't exist, matching the
    /// teacher's own plain `Config::default()` wiring in `src/main.rs`
    /// (no CLI-parsing crate).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

//! The experimentation backend adapter contract.

use crate::types::{
    DeployOutcome, Experiment, ExperimentProposal, ExperimentResult, VariantAssignment,
};
use async_trait::async_trait;
use kaizen_common::Result;
use std::collections::HashMap;

/// Contract every experimentation backend adapter must satisfy. The
/// engine only ever talks to this trait; `InMemoryExperimentBackend` is
/// the reference adapter used in-process and by tests.
#[async_trait]
pub trait ExperimentBackend: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn create_experiment(&self, proposal: ExperimentProposal) -> Result<Experiment>;

    async fn create_experiments(
        &self,
        proposals: Vec<ExperimentProposal>,
    ) -> Result<Vec<Experiment>> {
        let mut experiments = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            experiments.push(self.create_experiment(proposal).await?);
        }
        Ok(experiments)
    }

    async fn get_variant(
        &self,
        name: &str,
        user_id: &str,
        attrs: Option<&HashMap<String, String>>,
    ) -> Result<VariantAssignment>;

    async fn log_exposure(&self, name: &str, user_id: &str, variant_name: &str) -> Result<()>;

    async fn log_event(
        &self,
        name: &str,
        metadata: &HashMap<String, f64>,
        user_id: Option<&str>,
    ) -> Result<()>;

    async fn flush(&self) -> Result<()>;

    async fn get_experiment_results(&self, name: &str) -> Result<ExperimentResult>;

    async fn list_experiments(&self) -> Result<Vec<Experiment>>;

    async fn get_experiment_config(&self, name: &str) -> Result<Option<Experiment>>;

    async fn stop_experiment(&self, name: &str) -> Result<()>;

    async fn archive_experiment(&self, name: &str) -> Result<()>;

    async fn rollback(&self, name: &str, reason: Option<&str>) -> Result<()>;

    async fn deploy_winner(&self, name: &str) -> Result<DeployOutcome>;

    async fn set_deployment_threshold(&self, p: f64) -> Result<()>;

    async fn is_shutdown(&self) -> bool;

    async fn shutdown(&self) -> Result<()> {
        self.flush().await
    }
}

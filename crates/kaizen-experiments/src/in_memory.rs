//! Reference in-memory experimentation backend adapter.

use crate::backend::ExperimentBackend;
use crate::types::{
    ArmResult, DeployOutcome, Experiment, ExperimentProposal, ExperimentResult, ExperimentState,
    Variant, VariantAssignment, Winner,
};
use async_trait::async_trait;
use kaizen_common::{current_timestamp, generate_id, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::info;

struct Exposure {
    user_id: String,
    variant: String,
}

#[derive(Default)]
struct ExperimentRecord {
    experiment: Experiment,
    exposures: Vec<Exposure>,
    events: Vec<(Option<String>, HashMap<String, f64>)>,
    forced_result: Option<ExperimentResult>,
    local_value: f64,
}

impl Default for Experiment {
    fn default() -> Self {
        Experiment {
            id: String::new(),
            name: String::new(),
            control: Variant {
                name: "control".to_string(),
                value: 0.0,
                description: None,
            },
            treatment: Variant {
                name: "treatment".to_string(),
                value: 0.0,
                description: None,
            },
            success_metrics: Vec::new(),
            hypothesis: String::new(),
            created_at: current_timestamp(),
            state: ExperimentState::Created,
        }
    }
}

/// In-process reference implementation of [`ExperimentBackend`]. Keeps
/// every experiment, exposure and event in memory; intended for tests
/// and as the default adapter when no external backend is configured.
pub struct InMemoryExperimentBackend {
    experiments: RwLock<HashMap<String, ExperimentRecord>>,
    deployment_threshold: RwLock<f64>,
    shutdown: AtomicBool,
}

impl Default for InMemoryExperimentBackend {
    fn default() -> Self {
        Self {
            experiments: RwLock::new(HashMap::new()),
            deployment_threshold: RwLock::new(0.95),
            shutdown: AtomicBool::new(false),
        }
    }
}

impl InMemoryExperimentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-injection escape hatch: forces `getExperimentResults(name)`
    /// to return `result` instead of the reference significance model's
    /// inconclusive default.
    pub async fn force_result(&self, name: &str, result: ExperimentResult) {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record.forced_result = Some(result);
        }
    }

    fn assign_variant(name: &str, user_id: &str) -> &'static str {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in format!("{name}:{user_id}").bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        if hash % 2 == 0 {
            "control"
        } else {
            "treatment"
        }
    }
}

#[async_trait]
impl ExperimentBackend for InMemoryExperimentBackend {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create_experiment(&self, proposal: ExperimentProposal) -> Result<Experiment> {
        let experiment = Experiment {
            id: generate_id().to_string(),
            name: proposal.name.clone(),
            control: Variant {
                name: "control".to_string(),
                value: proposal.control_value,
                description: proposal.control_description,
            },
            treatment: Variant {
                name: "treatment".to_string(),
                value: proposal.treatment_value,
                description: proposal.treatment_description,
            },
            success_metrics: proposal.success_metrics,
            hypothesis: proposal.hypothesis,
            created_at: current_timestamp(),
            state: ExperimentState::Running,
        };
        let record = ExperimentRecord {
            local_value: proposal.control_value,
            experiment: experiment.clone(),
            exposures: Vec::new(),
            events: Vec::new(),
            forced_result: None,
        };
        self.experiments
            .write()
            .await
            .insert(proposal.name, record);
        Ok(experiment)
    }

    async fn get_variant(
        &self,
        name: &str,
        user_id: &str,
        _attrs: Option<&HashMap<String, String>>,
    ) -> Result<VariantAssignment> {
        let experiments = self.experiments.read().await;
        match experiments.get(name) {
            Some(record) => {
                let variant = Self::assign_variant(name, user_id);
                let value = if variant == "control" {
                    record.experiment.control.value
                } else {
                    record.experiment.treatment.value
                };
                Ok(VariantAssignment {
                    name: variant.to_string(),
                    value,
                })
            }
            None => Ok(VariantAssignment {
                name: "control".to_string(),
                value: 0.0,
            }),
        }
    }

    async fn log_exposure(&self, name: &str, user_id: &str, variant_name: &str) -> Result<()> {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record.exposures.push(Exposure {
                user_id: user_id.to_string(),
                variant: variant_name.to_string(),
            });
        }
        Ok(())
    }

    async fn log_event(
        &self,
        name: &str,
        metadata: &HashMap<String, f64>,
        user_id: Option<&str>,
    ) -> Result<()> {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record
                .events
                .push((user_id.map(|s| s.to_string()), metadata.clone()));
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn get_experiment_results(&self, name: &str) -> Result<ExperimentResult> {
        let experiments = self.experiments.read().await;
        let Some(record) = experiments.get(name) else {
            let mut result = ExperimentResult::inconclusive();
            result.error = Some("Experiment not found".to_string());
            return Ok(result);
        };
        if let Some(forced) = &record.forced_result {
            return Ok(forced.clone());
        }

        let variant_of = |user_id: &str| -> Option<&str> {
            record
                .exposures
                .iter()
                .find(|e| e.user_id == user_id)
                .map(|e| e.variant.as_str())
        };

        let mut control = ArmResult::default();
        let mut treatment = ArmResult::default();
        let mut control_sums: HashMap<String, (f64, u64)> = HashMap::new();
        let mut treatment_sums: HashMap<String, (f64, u64)> = HashMap::new();

        for (user_id, metadata) in &record.events {
            let variant = user_id.as_deref().and_then(variant_of);
            match variant {
                Some("control") => {
                    control.sample_size += 1;
                    for (k, v) in metadata {
                        let entry = control_sums.entry(k.clone()).or_insert((0.0, 0));
                        entry.0 += v;
                        entry.1 += 1;
                    }
                }
                Some("treatment") => {
                    treatment.sample_size += 1;
                    for (k, v) in metadata {
                        let entry = treatment_sums.entry(k.clone()).or_insert((0.0, 0));
                        entry.0 += v;
                        entry.1 += 1;
                    }
                }
                _ => {}
            }
        }
        for (k, (sum, count)) in control_sums {
            control.metrics.insert(k, sum / count as f64);
        }
        for (k, (sum, count)) in treatment_sums {
            treatment.metrics.insert(k, sum / count as f64);
        }

        // Reference statistical-significance model: this in-memory
        // adapter never claims significance on its own; callers that
        // need a real computation inject one via `force_result`.
        Ok(ExperimentResult {
            control,
            treatment,
            is_significant: false,
            p_value: 1.0,
            winner: Winner::None,
            error: None,
        })
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let experiments = self.experiments.read().await;
        let mut out: Vec<Experiment> = experiments.values().map(|r| r.experiment.clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_experiment_config(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .experiments
            .read()
            .await
            .get(name)
            .map(|r| r.experiment.clone()))
    }

    async fn stop_experiment(&self, name: &str) -> Result<()> {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record.experiment.state = ExperimentState::Stopped;
        }
        Ok(())
    }

    async fn archive_experiment(&self, name: &str) -> Result<()> {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record.experiment.state = ExperimentState::Archived;
        }
        Ok(())
    }

    async fn rollback(&self, name: &str, reason: Option<&str>) -> Result<()> {
        if let Some(record) = self.experiments.write().await.get_mut(name) {
            record.experiment.state = ExperimentState::RolledBack;
            info!(experiment = name, reason = reason.unwrap_or(""), "experiment_rollback");
        }
        Ok(())
    }

    async fn deploy_winner(&self, name: &str) -> Result<DeployOutcome> {
        let threshold = *self.deployment_threshold.read().await;
        let results = self.get_experiment_results(name).await?;

        let mut experiments = self.experiments.write().await;
        let Some(record) = experiments.get_mut(name) else {
            return Ok(DeployOutcome::not_deployed("Experiment not found"));
        };

        if !results.is_significant {
            return Ok(DeployOutcome::not_deployed("Result is not statistically significant"));
        }
        if results.p_value > 1.0 - threshold {
            return Ok(DeployOutcome::not_deployed(format!(
                "p-value {:.4} exceeds the significance bound for threshold {:.2}",
                results.p_value, threshold
            )));
        }
        let (variant_name, new_value) = match results.winner {
            Winner::Control => ("control", record.experiment.control.value),
            Winner::Treatment => ("treatment", record.experiment.treatment.value),
            Winner::None => {
                return Ok(DeployOutcome::not_deployed("No winner was determined"));
            }
        };

        let previous_value = record.local_value;
        record.local_value = new_value;
        record.experiment.state = ExperimentState::Deployed;
        let deployed_at = current_timestamp();

        Ok(DeployOutcome {
            deployed: true,
            variant: Some(variant_name.to_string()),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
            deployed_at: Some(deployed_at),
            reason: None,
        })
    }

    async fn set_deployment_threshold(&self, p: f64) -> Result<()> {
        *self.deployment_threshold.write().await = p;
        Ok(())
    }

    async fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        self.flush().await?;
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(name: &str) -> ExperimentProposal {
        ExperimentProposal {
            name: name.to_string(),
            control_value: 5.0,
            treatment_value: 3.0,
            control_description: None,
            treatment_description: None,
            success_metrics: vec!["crash_prediction_accuracy".to_string()],
            hypothesis: "fewer crashes".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_experiment_returns_control_with_zero() {
        let backend = InMemoryExperimentBackend::new();
        let assignment = backend.get_variant("missing", "user-1", None).await.unwrap();
        assert_eq!(assignment.name, "control");
        assert_eq!(assignment.value, 0.0);
    }

    #[tokio::test]
    async fn variant_assignment_is_deterministic() {
        let backend = InMemoryExperimentBackend::new();
        backend.create_experiment(proposal("exp_1")).await.unwrap();
        let a = backend.get_variant("exp_1", "user-42", None).await.unwrap();
        let b = backend.get_variant("exp_1", "user-42", None).await.unwrap();
        assert_eq!(a.name, b.name);
        assert_eq!(a.value, b.value);
    }

    #[tokio::test]
    async fn deploy_winner_missing_experiment_reports_reason() {
        let backend = InMemoryExperimentBackend::new();
        let outcome = backend.deploy_winner("missing").await.unwrap();
        assert!(!outcome.deployed);
        assert_eq!(outcome.reason.as_deref(), Some("Experiment not found"));
    }

    #[tokio::test]
    async fn deploy_winner_requires_significance() {
        let backend = InMemoryExperimentBackend::new();
        backend.create_experiment(proposal("exp_2")).await.unwrap();
        let outcome = backend.deploy_winner("exp_2").await.unwrap();
        assert!(!outcome.deployed);
    }

    #[tokio::test]
    async fn deploy_winner_succeeds_with_forced_significant_result() {
        let backend = InMemoryExperimentBackend::new();
        backend.create_experiment(proposal("exp_3")).await.unwrap();
        backend
            .force_result(
                "exp_3",
                ExperimentResult {
                    control: ArmResult::default(),
                    treatment: ArmResult::default(),
                    is_significant: true,
                    p_value: 0.01,
                    winner: Winner::Treatment,
                    error: None,
                },
            )
            .await;
        let outcome = backend.deploy_winner("exp_3").await.unwrap();
        assert!(outcome.deployed);
        assert_eq!(outcome.variant.as_deref(), Some("treatment"));
        assert_eq!(outcome.new_value, Some(3.0));
    }

    #[tokio::test]
    async fn rollback_transitions_state() {
        let backend = InMemoryExperimentBackend::new();
        backend.create_experiment(proposal("exp_4")).await.unwrap();
        backend.rollback("exp_4", Some("regression detected")).await.unwrap();
        let config = backend.get_experiment_config("exp_4").await.unwrap().unwrap();
        assert_eq!(config.state, ExperimentState::RolledBack);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let backend = InMemoryExperimentBackend::new();
        backend.shutdown().await.unwrap();
        backend.shutdown().await.unwrap();
        assert!(backend.is_shutdown().await);
    }
}

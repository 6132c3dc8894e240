//! The Kaizen engine: three independently-timed cycles (detection,
//! safety, progress) driving the detector, safety evaluator and
//! experimentation backend (C5).

use crate::types::{
    EngineConfig, EngineEvent, EngineStats, ExperimentPhase, ExperimentStatus, ImprovementReport,
    RoiBaseline, RoiReport, StatusReport,
};
use kaizen_common::{Clock, Error, Result};
use kaizen_detector::OpportunityDetector;
use kaizen_experiments::{ExperimentBackend, ExperimentProposal};
use kaizen_metrics::MetricRegistry;
use kaizen_safety::SafetyBounds;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, warn};

use crate::EngineState;

struct Shared {
    state: RwLock<EngineState>,
    paused: RwLock<bool>,
    active_experiments: RwLock<HashMap<String, kaizen_experiments::Experiment>>,
    completed_experiments: RwLock<Vec<kaizen_experiments::Experiment>>,
    rolledback_experiments: RwLock<Vec<kaizen_experiments::Experiment>>,
    stats: RwLock<EngineStats>,
    last_detection_cycle: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
    last_safety_check: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
    last_progress_check: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::Uninitialized),
            paused: RwLock::new(false),
            active_experiments: RwLock::new(HashMap::new()),
            completed_experiments: RwLock::new(Vec::new()),
            rolledback_experiments: RwLock::new(Vec::new()),
            stats: RwLock::new(EngineStats::default()),
            last_detection_cycle: RwLock::new(None),
            last_safety_check: RwLock::new(None),
            last_progress_check: RwLock::new(None),
        }
    }
}

/// The central control plane. Cheap to clone: every field is an `Arc`
/// or wraps one, so a clone shares state with the original (the three
/// cycle loops run against a clone held internally).
#[derive(Clone)]
pub struct KaizenEngine {
    config: Arc<EngineConfig>,
    registry: Arc<MetricRegistry>,
    safety: Arc<SafetyBounds>,
    detector: Arc<OpportunityDetector>,
    backend: Arc<dyn ExperimentBackend>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<EngineEvent>,
    shared: Arc<Shared>,
    handles: Arc<RwLock<Vec<JoinHandle<()>>>>,
}

impl KaizenEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<MetricRegistry>,
        safety: Arc<SafetyBounds>,
        detector: Arc<OpportunityDetector>,
        backend: Arc<dyn ExperimentBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.detection_interval_ms < 0 {
            return Err(Error::InvalidConfig(
                "detection_interval_ms must be non-negative".to_string(),
            ));
        }
        let (events, _) = broadcast::channel(256);
        Ok(Self {
            config: Arc::new(config),
            registry,
            safety,
            detector,
            backend,
            clock,
            events,
            shared: Arc::new(Shared::new()),
            handles: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Idempotently initializes the experimentation backend.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.shared.state.write().await;
        if !matches!(*state, EngineState::Uninitialized) {
            return Ok(());
        }
        self.backend.initialize().await?;
        *state = EngineState::Initialized;
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        {
            let state = self.shared.state.read().await;
            if matches!(*state, EngineState::Running) {
                return Err(Error::InvalidInput("engine is already running".to_string()));
            }
        }
        self.initialize().await?;

        *self.shared.state.write().await = EngineState::Running;
        *self.shared.paused.write().await = false;

        let detection_period = Duration::from_millis(self.config.detection_interval_ms as u64);
        let safety_period = Duration::from_millis((self.config.detection_interval_ms / 2).max(1) as u64);
        let progress_period = Duration::from_millis((self.config.detection_interval_ms * 2).max(1) as u64);

        let mut handles = self.handles.write().await;
        handles.push(self.spawn_loop(detection_period, Self::detection_cycle));
        handles.push(self.spawn_loop(safety_period, Self::safety_cycle));
        handles.push(self.spawn_loop(progress_period, Self::progress_cycle));
        drop(handles);

        self.emit(EngineEvent::Started);
        Ok(())
    }

    fn spawn_loop<F, Fut>(&self, period: Duration, cycle: F) -> JoinHandle<()>
    where
        F: Fn(KaizenEngine) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let paused = *engine.shared.paused.read().await;
                let state = *engine.shared.state.read().await;
                if paused || !matches!(state, EngineState::Running) {
                    continue;
                }
                cycle(engine.clone()).await;
            }
        })
    }

    pub async fn stop(&self) -> Result<()> {
        let mut handles = self.handles.write().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        drop(handles);
        *self.shared.state.write().await = EngineState::Stopped;
        self.emit(EngineEvent::Stopped);
        Ok(())
    }

    pub async fn pause(&self) {
        *self.shared.paused.write().await = true;
        self.emit(EngineEvent::Paused);
    }

    pub async fn resume(&self) {
        *self.shared.paused.write().await = false;
        self.emit(EngineEvent::Resumed);
    }

    pub async fn is_paused(&self) -> bool {
        *self.shared.paused.read().await
    }

    pub async fn state(&self) -> EngineState {
        *self.shared.state.read().await
    }

    async fn detection_cycle(self) {
        if let Err(err) = self.detection_cycle_inner().await {
            self.record_error("detection", err).await;
        }
    }

    async fn detection_cycle_inner(&self) -> Result<()> {
        self.emit(EngineEvent::DetectionCycle);
        *self.shared.last_detection_cycle.write().await = Some(self.clock.now());
        self.shared.stats.write().await.detection_cycles += 1;

        let snapshot = self.registry.snapshot();
        if snapshot.gauges.is_empty() && snapshot.counters.is_empty() && snapshot.histograms.is_empty() {
            self.emit(EngineEvent::DetectionSkipped(
                "No new metrics available".to_string(),
            ));
            return Ok(());
        }

        let opportunities = self.detector.detect_opportunities(&snapshot).await;
        if opportunities.is_empty() {
            return Ok(());
        }
        self.shared.stats.write().await.opportunities_detected += opportunities.len() as u64;
        self.emit(EngineEvent::OpportunitiesDetected(opportunities.clone()));
        self.create_experiments_from_opportunities(opportunities).await
    }

    async fn create_experiments_from_opportunities(
        &self,
        opportunities: Vec<kaizen_detector::Opportunity>,
    ) -> Result<()> {
        if self.shared.active_experiments.read().await.len() >= self.config.max_concurrent_experiments {
            self.emit(EngineEvent::MaxExperimentsReached);
            return Ok(());
        }

        let snapshot = self.registry.snapshot();
        for opportunity in opportunities {
            if self.shared.active_experiments.read().await.len() >= self.config.max_concurrent_experiments {
                self.emit(EngineEvent::MaxExperimentsReached);
                break;
            }

            let validation = self.safety.validate(&snapshot).await;
            if validation.should_rollback {
                let reason = validation
                    .rollback_reason
                    .clone()
                    .unwrap_or_else(|| "safety bounds exceeded".to_string());
                self.shared.stats.write().await.experiments_rejected += 1;
                self.emit(EngineEvent::ExperimentRejected {
                    opportunity,
                    reason,
                });
                continue;
            }

            let scaffold = opportunity.to_scaffold(self.clock.now().timestamp_millis() as u64);
            let proposal = ExperimentProposal {
                name: scaffold.name,
                control_value: scaffold.control.value,
                treatment_value: scaffold.treatment.value,
                control_description: Some(scaffold.control.description),
                treatment_description: Some(scaffold.treatment.description),
                success_metrics: scaffold.success_metrics,
                hypothesis: scaffold.hypothesis,
            };
            let experiment = self.backend.create_experiment(proposal).await?;
            self.shared
                .active_experiments
                .write()
                .await
                .insert(experiment.name.clone(), experiment.clone());
            self.shared.stats.write().await.experiments_created += 1;
            self.emit(EngineEvent::ExperimentCreated(experiment));
        }
        Ok(())
    }

    async fn safety_cycle(self) {
        if let Err(err) = self.safety_cycle_inner().await {
            self.record_error("safety", err).await;
        }
    }

    async fn safety_cycle_inner(&self) -> Result<()> {
        self.emit(EngineEvent::SafetyCheck);
        *self.shared.last_safety_check.write().await = Some(self.clock.now());
        self.shared.stats.write().await.safety_cycles += 1;

        let snapshot = self.registry.snapshot();
        let result = self.safety.validate(&snapshot).await;
        if !result.passed {
            self.emit(EngineEvent::SafetyViolation(result.violations.clone()));
        }
        if !result.should_rollback {
            return Ok(());
        }

        let reason = result
            .rollback_reason
            .clone()
            .unwrap_or_else(|| "safety bounds exceeded".to_string());
        let names: Vec<String> = self.shared.active_experiments.read().await.keys().cloned().collect();
        for name in names {
            if self.backend.rollback(&name, Some(&reason)).await.is_err() {
                warn!(experiment = %name, "rollback attempt failed");
                continue;
            }
            if let Some(experiment) = self.shared.active_experiments.write().await.remove(&name) {
                self.shared.rolledback_experiments.write().await.push(experiment);
                self.shared.stats.write().await.rollbacks += 1;
                self.emit(EngineEvent::AutoRollback {
                    experiment: name,
                    reason: reason.clone(),
                });
            }
        }
        Ok(())
    }

    async fn progress_cycle(self) {
        if let Err(err) = self.progress_cycle_inner().await {
            self.record_error("progress", err).await;
        }
    }

    async fn progress_cycle_inner(&self) -> Result<()> {
        self.emit(EngineEvent::ProgressCheck);
        *self.shared.last_progress_check.write().await = Some(self.clock.now());
        self.shared.stats.write().await.progress_cycles += 1;

        let names: Vec<String> = self.shared.active_experiments.read().await.keys().cloned().collect();
        let status: Vec<ExperimentStatus> = names
            .iter()
            .map(|name| ExperimentStatus {
                name: name.clone(),
                phase: ExperimentPhase::Active,
            })
            .collect();
        self.emit(EngineEvent::ProgressUpdate(status));

        let snapshot = self.registry.snapshot();
        for name in names {
            let result = self.backend.get_experiment_results(&name).await?;
            if result.control.sample_size < self.config.min_sample_size
                || result.treatment.sample_size < self.config.min_sample_size
            {
                continue;
            }
            let winner_present = !matches!(result.winner, kaizen_experiments::Winner::None);
            if !(result.is_significant && winner_present) {
                continue;
            }

            let validation = self.safety.validate_experiment(&name, &snapshot).await;
            if validation.should_rollback {
                let reason = validation
                    .rollback_reason
                    .clone()
                    .unwrap_or_else(|| "safety bounds exceeded".to_string());
                self.emit(EngineEvent::DeploymentRejected {
                    experiment: name,
                    reason,
                });
                continue;
            }

            let outcome = self.backend.deploy_winner(&name).await?;
            if outcome.deployed {
                if let Some(experiment) = self.shared.active_experiments.write().await.remove(&name) {
                    self.shared.completed_experiments.write().await.push(experiment);
                    self.shared.stats.write().await.deployments += 1;
                    self.emit(EngineEvent::AutoDeployed(outcome));
                }
            }
        }
        Ok(())
    }

    async fn record_error(&self, phase: &str, err: Error) {
        error!(phase, error = %err, "cycle failed");
        self.shared.stats.write().await.errors += 1;
        self.emit(EngineEvent::Error {
            phase: phase.to_string(),
            error: err.to_string(),
        });
    }

    pub async fn generate_status_report(&self) -> StatusReport {
        StatusReport {
            state: *self.shared.state.read().await,
            paused: *self.shared.paused.read().await,
            stats: self.shared.stats.read().await.clone(),
            active_experiments: self.shared.active_experiments.read().await.len(),
            completed_experiments: self.shared.completed_experiments.read().await.len(),
            rolledback_experiments: self.shared.rolledback_experiments.read().await.len(),
            last_detection_cycle: *self.shared.last_detection_cycle.read().await,
            last_safety_check: *self.shared.last_safety_check.read().await,
            last_progress_check: *self.shared.last_progress_check.read().await,
        }
    }

    pub async fn generate_improvement_report(&self) -> ImprovementReport {
        let completed = self.shared.completed_experiments.read().await.clone();
        let stats = self.shared.stats.read().await;
        ImprovementReport {
            completed_experiments: completed,
            total_deployed: stats.deployments,
            total_rolled_back: stats.rollbacks,
        }
    }

    /// Computes ROI from supplied baselines. Absent any field, that
    /// field's contribution defaults to zero (spec.md §4.5).
    pub fn calculate_roi(&self, baseline: &RoiBaseline) -> RoiReport {
        let crash_reduction = match (baseline.baseline_crash_rate, baseline.current_crash_rate) {
            (Some(base), Some(current)) if base > 0.0 => (base - current) / base,
            _ => 0.0,
        };
        let performance_gain = match (baseline.baseline_latency_ms, baseline.current_latency_ms) {
            (Some(base), Some(current)) if base > 0.0 => (base - current) / base,
            _ => 0.0,
        };
        let token_savings = match (baseline.baseline_token_cost, baseline.current_token_cost) {
            (Some(base), Some(current)) if base > 0.0 => (base - current) / base,
            _ => 0.0,
        };
        RoiReport {
            crash_reduction,
            performance_gain,
            token_savings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaizen_common::SystemClock;
    use kaizen_detector::DetectorConfig;
    use kaizen_experiments::InMemoryExperimentBackend;
    use kaizen_safety::default_bounds;
    use std::time::Duration as StdDuration;

    fn new_engine(detection_interval_ms: i64) -> KaizenEngine {
        let registry = Arc::new(MetricRegistry::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let safety = Arc::new(SafetyBounds::new(default_bounds()));
        let detector = Arc::new(OpportunityDetector::new(DetectorConfig::default(), clock.clone()));
        let backend: Arc<dyn ExperimentBackend> = Arc::new(InMemoryExperimentBackend::new());
        KaizenEngine::new(
            EngineConfig {
                detection_interval_ms,
                ..Default::default()
            },
            registry,
            safety,
            detector,
            backend,
            clock,
        )
        .expect("valid config")
    }

    #[test]
    fn rejects_negative_detection_interval() {
        let registry = Arc::new(MetricRegistry::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let safety = Arc::new(SafetyBounds::new(default_bounds()));
        let detector = Arc::new(OpportunityDetector::new(DetectorConfig::default(), clock.clone()));
        let backend: Arc<dyn ExperimentBackend> = Arc::new(InMemoryExperimentBackend::new());
        let result = KaizenEngine::new(
            EngineConfig {
                detection_interval_ms: -1,
                ..Default::default()
            },
            registry,
            safety,
            detector,
            backend,
            clock,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn start_rejects_second_start_while_running() {
        let engine = new_engine(50);
        engine.start().await.unwrap();
        let second = engine.start().await;
        assert!(matches!(second, Err(Error::InvalidInput(_))));
        engine.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn detection_cycle_skips_when_no_metrics_observed() {
        let engine = new_engine(10);
        let mut events = engine.subscribe();
        engine.start().await.unwrap();

        tokio::time::advance(StdDuration::from_millis(10)).await;
        tokio::task::yield_now().await;

        let mut saw_skip = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::DetectionSkipped(_)) {
                saw_skip = true;
            }
        }
        assert!(saw_skip);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_suppresses_cycles() {
        let engine = new_engine(1_000_000);
        engine.pause().await;
        assert!(engine.is_paused().await);
        engine.resume().await;
        assert!(!engine.is_paused().await);
    }

    #[test]
    fn roi_defaults_to_zero_without_baselines() {
        let engine = new_engine(60_000);
        let report = engine.calculate_roi(&RoiBaseline::default());
        assert_eq!(report.crash_reduction, 0.0);
        assert_eq!(report.performance_gain, 0.0);
        assert_eq!(report.token_savings, 0.0);
    }

    #[test]
    fn roi_computes_relative_improvement() {
        let engine = new_engine(60_000);
        let report = engine.calculate_roi(&RoiBaseline {
            baseline_crash_rate: Some(0.2),
            current_crash_rate: Some(0.1),
            ..Default::default()
        });
        assert!((report.crash_reduction - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn status_report_reflects_lifecycle_state() {
        let engine = new_engine(1_000_000);
        let report = engine.generate_status_report().await;
        assert_eq!(report.state, EngineState::Uninitialized);
        engine.start().await.unwrap();
        let report = engine.generate_status_report().await;
        assert_eq!(report.state, EngineState::Running);
        engine.stop().await.unwrap();
        let report = engine.generate_status_report().await;
        assert_eq!(report.state, EngineState::Stopped);
    }
}

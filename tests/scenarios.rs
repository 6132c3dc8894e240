//! End-to-end scenarios spanning the full Kaizen workspace (S1-S6),
//! wired against the in-memory experimentation backend and a fake
//! clock so the three engine loops fire deterministically instead of
//! on wall-clock time.

use kaizen_common::{Clock, FakeClock};
use kaizen_detector::{DetectorConfig, OpportunityDetector};
use kaizen_engine::{EngineConfig, EngineEvent, KaizenEngine};
use kaizen_experiments::{ArmResult, ExperimentBackend, ExperimentResult, InMemoryExperimentBackend, Winner};
use kaizen_metrics::MetricRegistry;
use kaizen_safety::{default_bounds, SafetyBounds};
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn harness(detection_interval_ms: i64) -> (KaizenEngine, Arc<MetricRegistry>, Arc<InMemoryExperimentBackend>) {
    let registry = Arc::new(MetricRegistry::new());
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(chrono::Utc::now()));
    let safety = Arc::new(SafetyBounds::new(default_bounds()));
    let detector = Arc::new(OpportunityDetector::new(
        DetectorConfig {
            min_confidence: 0.7,
            min_impact: 0.0,
            min_sample_size: 3,
            pattern_expiry_time_ms: 24 * 60 * 60 * 1000,
        },
        clock.clone(),
    ));
    let backend = Arc::new(InMemoryExperimentBackend::new());
    let engine = KaizenEngine::new(
        EngineConfig {
            detection_interval_ms,
            min_sample_size: 3,
            max_concurrent_experiments: 5,
            deployment_threshold: 0.95,
            max_retries: 3,
        },
        registry.clone(),
        safety,
        detector,
        backend.clone(),
        clock,
    )
    .expect("valid engine config");
    (engine, registry, backend)
}

/// S1 - no regression, no action: a healthy snapshot produces no
/// opportunities and no safety violations; one detection cycle emits
/// `detection_cycle` with no following `opportunities_detected`.
#[tokio::test(start_paused = true)]
async fn s1_no_regression_no_action() {
    let (engine, registry, _backend) = harness(10);
    registry
        .register_gauge("shim_crash_prediction_accuracy", "accuracy")
        .unwrap();
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.95).unwrap();
    registry
        .register_histogram("shim_checkpoint_creation_time", "checkpoint", vec![50.0, 100.0, 200.0])
        .unwrap();
    for v in [30.0, 40.0, 50.0] {
        registry.observe_histogram("shim_checkpoint_creation_time", v).unwrap();
    }

    let mut events = engine.subscribe();
    engine.start().await.unwrap();
    tokio::time::advance(StdDuration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let mut saw_detection_cycle = false;
    let mut saw_opportunities = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::DetectionCycle => saw_detection_cycle = true,
            EngineEvent::OpportunitiesDetected(_) => saw_opportunities = true,
            _ => {}
        }
    }
    assert!(saw_detection_cycle);
    assert!(!saw_opportunities);

    let report = engine.generate_status_report().await;
    assert_eq!(report.active_experiments, 0);
    engine.stop().await.unwrap();
}

/// S2 - opportunity detected, experiment created: a degraded crash
/// prediction accuracy produces a `checkpoint_interval_optimization`
/// opportunity and a created experiment. The detection loop may fire
/// more than once within one advanced period (the ticker's first tick
/// completes immediately), so this asserts occurrence rather than an
/// exact event count; the scaffold name is deterministic under the
/// frozen fake clock, so repeat firings collapse onto one active
/// experiment regardless.
#[tokio::test(start_paused = true)]
async fn s2_opportunity_detected_experiment_created() {
    let (engine, registry, _backend) = harness(10);
    registry
        .register_gauge("shim_crash_prediction_accuracy", "accuracy")
        .unwrap();
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.85).unwrap();

    let mut events = engine.subscribe();
    engine.start().await.unwrap();
    tokio::time::advance(StdDuration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let mut saw_opportunity = false;
    let mut saw_experiment = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::OpportunitiesDetected(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(
                    list[0].opportunity_type,
                    kaizen_detector::OpportunityType::CheckpointIntervalOptimization
                );
                assert!((list[0].confidence - 0.85).abs() < 1e-9);
                assert_eq!(list[0].current_value, 5.0);
                assert_eq!(list[0].proposed_value, 3.0);
                saw_opportunity = true;
            }
            EngineEvent::ExperimentCreated(_) => saw_experiment = true,
            _ => {}
        }
    }
    assert!(saw_opportunity);
    assert!(saw_experiment);

    let report = engine.generate_status_report().await;
    assert_eq!(report.active_experiments, 1);
    engine.stop().await.unwrap();
}

/// S3 - safety critical triggers rollback: while an experiment is
/// active, crash prediction accuracy collapses; the safety cycle emits
/// a critical violation and an auto-rollback, clearing active experiments.
#[tokio::test(start_paused = true)]
async fn s3_safety_critical_triggers_rollback() {
    let (engine, registry, _backend) = harness(20);
    registry
        .register_gauge("shim_crash_prediction_accuracy", "accuracy")
        .unwrap();
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.85).unwrap();

    let mut events = engine.subscribe();
    engine.start().await.unwrap();

    // First detection cycle (period 20ms) creates the experiment.
    tokio::time::advance(StdDuration::from_millis(20)).await;
    tokio::task::yield_now().await;
    assert_eq!(engine.generate_status_report().await.active_experiments, 1);

    // Degrade accuracy so crashRate derived = 0.30 > critical 0.25.
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.70).unwrap();

    // Safety period is detectionInterval/2 = 10ms.
    tokio::time::advance(StdDuration::from_millis(10)).await;
    tokio::task::yield_now().await;

    let mut saw_critical_violation = false;
    let mut saw_rollback = false;
    while let Ok(event) = events.try_recv() {
        match event {
            // Accuracy started at 0.85, which alone already breaches the
            // crashRate *warning* bound (derived 0.15 > max 0.10), so
            // earlier drained events may carry a lone warning; only the
            // post-degradation critical one is asserted on here.
            EngineEvent::SafetyViolation(violations) => {
                if let Some(v) = violations
                    .iter()
                    .find(|v| v.severity == kaizen_safety::Severity::Critical)
                {
                    assert_eq!(violations.len(), 1);
                    assert_eq!(v.bound_type, "crashRate");
                    assert!((v.current_value - 0.30).abs() < 1e-9);
                    assert_eq!(v.threshold, 0.10);
                    saw_critical_violation = true;
                }
            }
            EngineEvent::AutoRollback { .. } => saw_rollback = true,
            _ => {}
        }
    }
    assert!(saw_critical_violation);
    assert!(saw_rollback);
    assert_eq!(engine.generate_status_report().await.active_experiments, 0);
    engine.stop().await.unwrap();
}

/// S4 - deployment gate: a significant result with pValue within the
/// deployment threshold auto-deploys; a non-significant bound (pValue
/// 0.10 against threshold 0.95, bound = 0.05) is rejected silently.
#[tokio::test(start_paused = true)]
async fn s4_deployment_gate() {
    let (engine, registry, backend) = harness(20);
    registry
        .register_gauge("shim_crash_prediction_accuracy", "accuracy")
        .unwrap();
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.85).unwrap();

    let mut events = engine.subscribe();
    engine.start().await.unwrap();
    tokio::time::advance(StdDuration::from_millis(20)).await;
    tokio::task::yield_now().await;

    let active_names: Vec<String> = {
        let report = engine.generate_status_report().await;
        assert_eq!(report.active_experiments, 1);
        backend
            .list_experiments()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    };
    let name = &active_names[0];

    // Heal the crashRate gauge so the deployment-time safety check
    // (`validate_experiment`) doesn't reject on an unrelated bound; the
    // experiment itself, already created, is unaffected by this.
    registry.observe_gauge("shim_crash_prediction_accuracy", 0.97).unwrap();

    backend
        .force_result(
            name,
            ExperimentResult {
                control: ArmResult {
                    sample_size: 50,
                    metrics: Default::default(),
                },
                treatment: ArmResult {
                    sample_size: 50,
                    metrics: Default::default(),
                },
                is_significant: true,
                p_value: 0.01,
                winner: Winner::Treatment,
                error: None,
            },
        )
        .await;

    // Progress period is detectionInterval*2 = 40ms.
    tokio::time::advance(StdDuration::from_millis(40)).await;
    tokio::task::yield_now().await;

    let mut deployed = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::AutoDeployed(outcome) = event {
            deployed = true;
            assert_eq!(outcome.variant.as_deref(), Some("treatment"));
        }
    }
    assert!(deployed);
    assert_eq!(engine.generate_status_report().await.active_experiments, 0);
    engine.stop().await.unwrap();
}

/// S5 - retry backoff: an operation fails three times then succeeds;
/// total attempts = 4 and the retry statistic increments by 3.
#[tokio::test]
async fn s5_retry_backoff_then_success() {
    use kaizen_recovery::{BackoffStrategy, RetryConfig, RetryExecutor};
    use std::sync::atomic::{AtomicU32, Ordering};

    let executor = RetryExecutor::new(RetryConfig {
        max_retries: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        strategy: BackoffStrategy::Exponential,
        jitter: false,
        circuit_breaker_threshold: 10,
    });

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let result = executor
        .execute_with_retry("s5-op", move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err("network timeout".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // One history entry for the whole call: attemptCount=4, so
    // totalRetries (attemptCount - 1) increments by 3.
    let stats = executor.stats().await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.total_retries, 3);
}

/// S6 - decomposition with an hours constraint: development goal,
/// "Optimize performance" driving complexity, `maxHours=20` caps the
/// total and the dependency graph is a simple chain.
#[test]
fn s6_decomposition_with_constraint() {
    use kaizen_goals::{
        decomposer::{has_circular_dependencies, topological_sort},
        Decomposer, Goal, GoalConstraints, GoalType,
    };

    let decomposer = Decomposer::new();
    let goal = Goal {
        id: "perf-goal".to_string(),
        description: "Optimize performance".to_string(),
        goal_type: GoalType::Development,
        priority: 2,
        constraints: Some(GoalConstraints {
            max_hours: Some(20.0),
            deadline: None,
            resources: None,
        }),
    };

    let decomposition = decomposer.decompose(&goal).unwrap();
    assert!(decomposition.total_estimated_hours <= 20.0 + 1e-6);
    assert!(decomposition.subgoals.len() >= 3);
    assert!(!has_circular_dependencies(&decomposition));

    for i in 1..decomposition.subgoals.len() {
        assert_eq!(
            decomposition.subgoals[i].dependencies,
            vec![decomposition.subgoals[i - 1].id.clone()]
        );
    }

    let order = topological_sort(&decomposition);
    assert_eq!(order.len(), decomposition.subgoals.len());
}

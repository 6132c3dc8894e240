//! The opportunity detector: runs the seven policies against a
//! snapshot, filters and ranks the results, and maintains pattern memory.

use crate::memory::PatternMemory;
use crate::policies::{self, Candidate};
use crate::types::{DetectorConfig, ExperimentScaffold, Opportunity, PatternMemoryEntry};
use kaizen_common::{generate_id, Clock};
use kaizen_metrics::MetricSnapshot;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct OpportunityDetector {
    config: DetectorConfig,
    memory: RwLock<PatternMemory>,
    clock: Arc<dyn Clock>,
}

impl OpportunityDetector {
    pub fn new(config: DetectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            memory: RwLock::new(PatternMemory::new()),
            clock,
        }
    }

    fn candidates(&self, snapshot: &MetricSnapshot) -> Vec<Candidate> {
        let mut out = Vec::new();
        out.extend(policies::high_crash_rate(snapshot));
        out.extend(policies::slow_checkpoint(snapshot, self.config.min_sample_size));
        out.extend(policies::low_resume_rate(snapshot));
        out.extend(policies::low_routing_accuracy(snapshot));
        out.extend(policies::opus_overuse(snapshot, self.config.min_sample_size));
        out.extend(policies::slow_supervisor_restart(snapshot));
        out.extend(policies::monitor_latency(snapshot));
        out
    }

    /// Runs every detector against `snapshot`, filters by the configured
    /// confidence/sample-size floor, records each surfaced pattern in
    /// memory and expires stale entries.
    pub async fn detect_opportunities(&self, snapshot: &MetricSnapshot) -> Vec<Opportunity> {
        let now = self.clock.now();
        let candidates = self.candidates(snapshot);

        let mut surfaced = Vec::new();
        {
            let mut memory = self.memory.write().await;
            for candidate in candidates {
                if candidate.confidence < self.config.min_confidence
                    || candidate.sample_size < self.config.min_sample_size
                {
                    continue;
                }
                memory.record(&candidate.pattern, now);
                surfaced.push(Opportunity {
                    id: generate_id().to_string(),
                    opportunity_type: candidate.opportunity_type,
                    pattern: candidate.pattern,
                    hypothesis: candidate.hypothesis,
                    confidence: candidate.confidence,
                    impact: candidate.impact,
                    current_value: candidate.current_value,
                    proposed_value: candidate.proposed_value,
                    estimated_savings: candidate.estimated_savings,
                    sample_size: candidate.sample_size,
                    detected_at: now,
                });
            }
            memory.expire_stale(now, self.config.pattern_expiry_time_ms);
        }

        rank(surfaced)
    }

    pub async fn pattern_history(&self) -> Vec<PatternMemoryEntry> {
        self.memory.read().await.history()
    }

    /// Maps an opportunity onto an experiment scaffold for the
    /// experimentation backend.
    pub fn export_scaffold(&self, opportunity: &Opportunity) -> ExperimentScaffold {
        let now_millis = self.clock.now().timestamp_millis().max(0) as u64;
        opportunity.to_scaffold(now_millis)
    }
}

/// Sorts opportunities by `confidence * estimatedSavings` descending;
/// ties preserve insertion order (a stable sort over the original index).
fn rank(opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut indexed: Vec<(usize, Opportunity)> = opportunities.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        let score_a = a.confidence * a.estimated_savings;
        let score_b = b.confidence * b.estimated_savings;
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ia.cmp(ib))
    });
    indexed.into_iter().map(|(_, o)| o).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaizen_common::SystemClock;
    use kaizen_metrics::MetricRegistry;

    fn detector() -> OpportunityDetector {
        OpportunityDetector::new(
            DetectorConfig {
                min_confidence: 0.0,
                min_impact: 0.0,
                min_sample_size: 1,
                pattern_expiry_time_ms: 60_000,
            },
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn high_crash_rate_is_detected_and_ranked() {
        let registry = MetricRegistry::new();
        registry
            .register_gauge(policies::CRASH_ACCURACY_METRIC, "accuracy")
            .unwrap();
        registry
            .observe_gauge(policies::CRASH_ACCURACY_METRIC, 0.70)
            .unwrap();
        let snapshot = registry.snapshot();

        let detector = detector();
        let opportunities = detector.detect_opportunities(&snapshot).await;
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].current_value, 5.0);
        assert_eq!(opportunities[0].proposed_value, 3.0);
    }

    #[tokio::test]
    async fn ranking_orders_by_confidence_times_savings() {
        let registry = MetricRegistry::new();
        registry
            .register_gauge(policies::CRASH_ACCURACY_METRIC, "accuracy")
            .unwrap();
        registry
            .observe_gauge(policies::CRASH_ACCURACY_METRIC, 0.70)
            .unwrap(); // savings = 0.3 * 0.4 * 1000 = 120, score = 102
        registry
            .register_gauge(policies::RESUME_SUCCESS_METRIC, "resume")
            .unwrap();
        registry
            .observe_gauge(policies::RESUME_SUCCESS_METRIC, 0.50)
            .unwrap(); // savings = 0.45*1000=450, score=337.5
        let snapshot = registry.snapshot();

        let detector = detector();
        let opportunities = detector.detect_opportunities(&snapshot).await;
        assert_eq!(opportunities.len(), 2);
        assert_eq!(opportunities[0].pattern, "low resume success rate");
    }

    #[tokio::test]
    async fn pattern_memory_tracks_repeated_hits() {
        let registry = MetricRegistry::new();
        registry
            .register_gauge(policies::CRASH_ACCURACY_METRIC, "accuracy")
            .unwrap();
        registry
            .observe_gauge(policies::CRASH_ACCURACY_METRIC, 0.70)
            .unwrap();
        let snapshot = registry.snapshot();

        let detector = detector();
        detector.detect_opportunities(&snapshot).await;
        detector.detect_opportunities(&snapshot).await;
        let history = detector.pattern_history().await;
        let entry = history
            .iter()
            .find(|e| e.pattern == "high crash prediction rate")
            .unwrap();
        assert_eq!(entry.count, 2);
    }
}

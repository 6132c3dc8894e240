//! The seven exact detector policies run against a metric snapshot.

use crate::types::OpportunityType;
use kaizen_metrics::MetricSnapshot;

pub const CRASH_ACCURACY_METRIC: &str = "shim_crash_prediction_accuracy";
pub const CHECKPOINT_TIME_METRIC: &str = "shim_checkpoint_creation_time";
pub const RESUME_SUCCESS_METRIC: &str = "shim_resume_success_rate";
pub const ROUTING_ACCURACY_METRIC: &str = "shim_model_routing_accuracy";
pub const MODEL_SELECTIONS_COUNTER: &str = "model_selections_total";
pub const SUPERVISOR_RESTART_METRIC: &str = "shim_supervisor_restart_time";
pub const MONITOR_LATENCY_METRIC: &str = "shim_monitor_latency";

/// A raw detector hit, prior to id assignment and the confidence/sample
/// size surfacing filter.
pub struct Candidate {
    pub opportunity_type: OpportunityType,
    pub pattern: String,
    pub hypothesis: String,
    pub confidence: f64,
    pub impact: String,
    pub current_value: f64,
    pub proposed_value: f64,
    pub estimated_savings: f64,
    pub sample_size: u64,
}

/// 1. High crash rate
pub fn high_crash_rate(snapshot: &MetricSnapshot) -> Option<Candidate> {
    let accuracy = snapshot.gauge(CRASH_ACCURACY_METRIC)?;
    if accuracy >= 0.90 {
        return None;
    }
    let miss_rate = 1.0 - accuracy;
    if miss_rate <= 0.10 {
        return None;
    }
    Some(Candidate {
        opportunity_type: OpportunityType::CheckpointIntervalOptimization,
        pattern: "high crash prediction rate".to_string(),
        hypothesis: "Shortening the checkpoint interval reduces crash prediction miss rate"
            .to_string(),
        confidence: 0.85,
        impact: "high".to_string(),
        current_value: 5.0,
        proposed_value: 3.0,
        estimated_savings: miss_rate * 0.4 * 1000.0,
        sample_size: 10,
    })
}

/// 2. Slow checkpoint
pub fn slow_checkpoint(snapshot: &MetricSnapshot, min_sample_size: u64) -> Option<Candidate> {
    let hist = snapshot.histogram(CHECKPOINT_TIME_METRIC)?;
    let avg = hist.average()?;
    if avg <= 100.0 || hist.count < min_sample_size {
        return None;
    }
    let proposed = 0.5 * avg;
    Some(Candidate {
        opportunity_type: OpportunityType::CheckpointPerformance,
        pattern: "slow checkpoint creation".to_string(),
        hypothesis: "Reducing checkpoint payload size halves creation time".to_string(),
        confidence: 0.80,
        impact: "medium".to_string(),
        current_value: avg,
        proposed_value: proposed,
        estimated_savings: (avg - proposed) * hist.count as f64,
        sample_size: hist.count,
    })
}

/// 3. Low resume rate
pub fn low_resume_rate(snapshot: &MetricSnapshot) -> Option<Candidate> {
    let rate = snapshot.gauge(RESUME_SUCCESS_METRIC)?;
    if rate >= 0.90 {
        return None;
    }
    Some(Candidate {
        opportunity_type: OpportunityType::ResumeReliability,
        pattern: "low resume success rate".to_string(),
        hypothesis: "Validating checkpoint integrity before resume improves success rate"
            .to_string(),
        confidence: 0.75,
        impact: "high".to_string(),
        current_value: rate,
        proposed_value: 0.95,
        estimated_savings: (0.95 - rate) * 1000.0,
        sample_size: 10,
    })
}

/// 4. Low routing accuracy
pub fn low_routing_accuracy(snapshot: &MetricSnapshot) -> Option<Candidate> {
    let accuracy = snapshot.gauge(ROUTING_ACCURACY_METRIC)?;
    if accuracy >= 0.85 {
        return None;
    }
    Some(Candidate {
        opportunity_type: OpportunityType::ModelRoutingOptimization,
        pattern: "low model routing accuracy".to_string(),
        hypothesis: "Retuning routing heuristics improves model selection accuracy".to_string(),
        confidence: 0.80,
        impact: "medium".to_string(),
        current_value: accuracy,
        proposed_value: 0.90,
        estimated_savings: (0.90 - accuracy) * 1000.0,
        sample_size: 10,
    })
}

/// 5. Opus overuse
pub fn opus_overuse(snapshot: &MetricSnapshot, min_sample_size: u64) -> Option<Candidate> {
    let haiku = snapshot.counter_value(MODEL_SELECTIONS_COUNTER, &[("model", "haiku")]);
    let sonnet = snapshot.counter_value(MODEL_SELECTIONS_COUNTER, &[("model", "sonnet")]);
    let opus = snapshot.counter_value(MODEL_SELECTIONS_COUNTER, &[("model", "opus")]);
    let total = haiku + sonnet + opus;
    if total < min_sample_size as f64 {
        return None;
    }
    let opus_share = opus / total;
    if opus_share <= 0.30 {
        return None;
    }
    Some(Candidate {
        opportunity_type: OpportunityType::TokenOptimization,
        pattern: "overuse of the highest-cost model tier".to_string(),
        hypothesis: "Routing a larger share of requests to cheaper tiers cuts token cost"
            .to_string(),
        confidence: 0.85,
        impact: "high".to_string(),
        current_value: opus_share,
        proposed_value: 0.15,
        estimated_savings: (opus_share - 0.15) * total,
        sample_size: total as u64,
    })
}

/// 6. Slow supervisor restart
pub fn slow_supervisor_restart(snapshot: &MetricSnapshot) -> Option<Candidate> {
    let hist = snapshot.histogram(SUPERVISOR_RESTART_METRIC)?;
    let avg = hist.average()?;
    if avg <= 5000.0 {
        return None;
    }
    let proposed = 0.6 * avg;
    Some(Candidate {
        opportunity_type: OpportunityType::SupervisorPerformance,
        pattern: "slow supervisor restart".to_string(),
        hypothesis: "Lazy-loading non-critical subsystems speeds up supervisor restart"
            .to_string(),
        confidence: 0.75,
        impact: "medium".to_string(),
        current_value: avg,
        proposed_value: proposed,
        estimated_savings: (avg - proposed) * hist.count as f64,
        sample_size: hist.count,
    })
}

/// 7. Monitor latency
pub fn monitor_latency(snapshot: &MetricSnapshot) -> Option<Candidate> {
    let hist = snapshot.histogram(MONITOR_LATENCY_METRIC)?;
    let avg = hist.average()?;
    if avg <= 25.0 {
        return None;
    }
    let proposed = 0.5 * avg;
    Some(Candidate {
        opportunity_type: OpportunityType::MonitorLatency,
        pattern: "high monitor sampling latency".to_string(),
        hypothesis: "Reducing monitor sampling frequency halves observed latency".to_string(),
        confidence: 0.70,
        impact: "low".to_string(),
        current_value: avg,
        proposed_value: proposed,
        estimated_savings: (avg - proposed) * hist.count as f64,
        sample_size: hist.count,
    })
}

/// Coefficient-of-variation confidence over a sample vector: `1 - cv`,
/// clamped to `[0, 1]`; `0` for fewer than two samples.
pub fn confidence_from_samples(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let cv = stddev / mean.abs();
    (1.0 - cv).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_needs_at_least_two_samples() {
        assert_eq!(confidence_from_samples(&[]), 0.0);
        assert_eq!(confidence_from_samples(&[1.0]), 0.0);
    }

    #[test]
    fn confidence_is_one_for_constant_samples() {
        assert_eq!(confidence_from_samples(&[5.0, 5.0, 5.0]), 1.0);
    }

    #[test]
    fn confidence_drops_with_variance() {
        let c = confidence_from_samples(&[1.0, 10.0, 2.0, 9.0]);
        assert!(c >= 0.0 && c < 1.0);
    }
}

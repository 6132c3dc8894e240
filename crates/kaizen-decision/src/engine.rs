//! Confidence/risk scoring and decision history.

use crate::types::{Decision, DecisionConfig, DecisionContext, DecisionFilter, RiskLevel};
use kaizen_common::{current_timestamp, generate_id, Error, Result};
use tokio::sync::RwLock;

const HIGH_QUALITY_KEYWORDS: &[&str] = &[
    "proven", "tested", "documented", "reliable", "standard", "succeeded", "pass", "clear",
    "reasonable",
];
const LOW_QUALITY_KEYWORDS: &[&str] = &[
    "might", "unclear", "experimental", "untested", "failing", "risk",
];
const HIGH_RISK_MARKERS: &[&str] = &["production", "delete", "deploy", "failing", "unclear impact"];
const LOW_RISK_MARKERS: &[&str] = &["comment", "documentation", "safe", "reversible", "low impact"];

pub struct DecisionEngine {
    config: DecisionConfig,
    history: RwLock<Vec<Decision>>,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.confidence_threshold) {
            return Err(Error::InvalidConfig(format!(
                "confidenceThreshold must be within [0,1], got {}",
                config.confidence_threshold
            )));
        }
        Ok(Self {
            config,
            history: RwLock::new(Vec::new()),
        })
    }

    /// Scores `context` and records the resulting decision in history.
    pub async fn make_decision(&self, context: DecisionContext) -> Result<Decision> {
        if context.options.is_empty() {
            return Err(Error::InvalidInput("options must not be empty".to_string()));
        }

        let joined_evidence = context.evidence.join(" ").to_lowercase();
        let mut base = 20.0 * context.evidence.len().min(3) as f64;
        for keyword in HIGH_QUALITY_KEYWORDS {
            base += 10.0 * count_occurrences(&joined_evidence, keyword) as f64;
        }
        for keyword in LOW_QUALITY_KEYWORDS {
            base -= 15.0 * count_occurrences(&joined_evidence, keyword) as f64;
        }
        let confidence = base.clamp(0.0, 100.0);

        let combined = format!("{} {}", context.question.to_lowercase(), joined_evidence);
        let risk_level = if HIGH_RISK_MARKERS.iter().any(|m| combined.contains(m)) {
            RiskLevel::High
        } else if LOW_RISK_MARKERS.iter().any(|m| combined.contains(m)) {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        };

        let requires_human =
            confidence < self.config.confidence_threshold * 100.0 || risk_level == RiskLevel::High;

        let decision = Decision {
            id: generate_id().to_string(),
            question: context.question,
            choice: context.options[0].clone(),
            confidence,
            risk_level,
            requires_human,
            evidence: context.evidence,
            decided_at: current_timestamp(),
        };

        self.history.write().await.push(decision.clone());
        Ok(decision)
    }

    /// Scores every context and returns the decisions sorted by
    /// confidence descending.
    pub async fn evaluate_alternatives(&self, contexts: Vec<DecisionContext>) -> Result<Vec<Decision>> {
        let mut decisions = Vec::with_capacity(contexts.len());
        for context in contexts {
            decisions.push(self.make_decision(context).await?);
        }
        decisions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(decisions)
    }

    pub async fn history(&self, filter: &DecisionFilter) -> Vec<Decision> {
        self.history
            .read()
            .await
            .iter()
            .filter(|d| {
                filter.min_confidence.map_or(true, |min| d.confidence >= min)
                    && filter.max_confidence.map_or(true, |max| d.confidence <= max)
                    && filter.risk_level.map_or(true, |r| r == d.risk_level)
                    && filter.requires_human.map_or(true, |h| h == d.requires_human)
            })
            .cloned()
            .collect()
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(question: &str, options: &[&str], evidence: &[&str]) -> DecisionContext {
        DecisionContext {
            question: question.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            evidence: evidence.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_options() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        let err = engine
            .make_decision(context("q", &[], &["tested"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn out_of_range_threshold_is_invalid_config() {
        let err = DecisionEngine::new(DecisionConfig {
            confidence_threshold: 1.5,
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn high_quality_evidence_raises_confidence() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        let decision = engine
            .make_decision(context(
                "Should we ship this?",
                &["yes", "no"],
                &["This is a proven, tested, reliable approach"],
            ))
            .await
            .unwrap();
        assert!(decision.confidence > 50.0);
        assert_eq!(decision.choice, "yes");
    }

    #[tokio::test]
    async fn production_mentions_force_high_risk_and_human_review() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        let decision = engine
            .make_decision(context(
                "Deploy to production?",
                &["yes", "no"],
                &["tested", "documented", "reliable"],
            ))
            .await
            .unwrap();
        assert_eq!(decision.risk_level, RiskLevel::High);
        assert!(decision.requires_human);
    }

    #[tokio::test]
    async fn low_quality_evidence_lowers_confidence_and_requires_human() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        let decision = engine
            .make_decision(context(
                "Update the comment in this file",
                &["yes", "no"],
                &["this is untested and might be risky"],
            ))
            .await
            .unwrap();
        assert!(decision.confidence < 60.0);
        assert_eq!(decision.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn evaluate_alternatives_sorts_by_confidence_descending() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        let decisions = engine
            .evaluate_alternatives(vec![
                context("weak", &["a"], &["untested"]),
                context("strong", &["a"], &["proven", "tested", "documented"]),
            ])
            .await
            .unwrap();
        assert_eq!(decisions[0].question, "strong");
        assert_eq!(decisions[1].question, "weak");
    }

    #[tokio::test]
    async fn history_filters_by_requires_human() {
        let engine = DecisionEngine::new(DecisionConfig::default()).unwrap();
        engine
            .make_decision(context("Deploy to production?", &["a"], &[]))
            .await
            .unwrap();
        engine
            .make_decision(context("Fix a comment", &["a"], &["proven", "tested", "documented"]))
            .await
            .unwrap();
        let filtered = engine
            .history(&DecisionFilter {
                requires_human: Some(true),
                ..Default::default()
            })
            .await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].question, "Deploy to production?");
    }
}

//! The metric registry: gauges, counters and histograms with a
//! Prometheus-compatible text exposition.

use crate::types::{
    normalize_labels, HistogramData, HistogramSnapshot, LabelSet, MetricData, MetricEntry,
    MetricKind, MetricSnapshot,
};
use kaizen_common::{validate_metric_name, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Typed metric store. Cheap to clone (wraps an `Arc` internally via
/// `parking_lot::RwLock` held behind a plain struct field), but in
/// practice callers share one instance behind an `Arc<MetricRegistry>`.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: RwLock<HashMap<String, MetricEntry>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name(name: &str) -> Result<()> {
        if !validate_metric_name(name) {
            return Err(Error::InvalidInput(format!(
                "invalid metric name: {name}"
            )));
        }
        Ok(())
    }

    /// Register a gauge. Idempotent: a second call with the same name is
    /// a silent no-op, regardless of the `help` text passed the second
    /// time.
    pub fn register_gauge(&self, name: &str, help: &str) -> Result<()> {
        Self::check_name(name)?;
        let mut metrics = self.metrics.write();
        metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Gauge,
            help: help.to_string(),
            label_keys: Vec::new(),
            data: MetricData::Gauge(HashMap::new()),
        });
        Ok(())
    }

    /// Register a counter, optionally with a set of label keys.
    pub fn register_counter(&self, name: &str, help: &str, label_keys: &[&str]) -> Result<()> {
        Self::check_name(name)?;
        for key in label_keys {
            Self::check_name(key)?;
        }
        let mut metrics = self.metrics.write();
        metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Counter,
            help: help.to_string(),
            label_keys: label_keys.iter().map(|s| s.to_string()).collect(),
            data: MetricData::Counter(HashMap::new()),
        });
        Ok(())
    }

    /// Register a histogram with ascending bucket boundaries (the `+Inf`
    /// bucket is implicit and not stored in `buckets`).
    pub fn register_histogram(&self, name: &str, help: &str, buckets: Vec<f64>) -> Result<()> {
        Self::check_name(name)?;
        let mut metrics = self.metrics.write();
        metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Histogram,
            help: help.to_string(),
            label_keys: Vec::new(),
            data: MetricData::Histogram(HistogramData::new(buckets)),
        });
        Ok(())
    }

    /// Observe a gauge sample (unlabeled).
    pub fn observe_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.observe_gauge_with_labels(name, &[], value)
    }

    /// Observe a gauge sample with a label tuple, auto-registering the
    /// gauge if it hasn't been registered yet.
    pub fn observe_gauge_with_labels(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<()> {
        Self::check_name(name)?;
        let key = normalize_labels(labels);
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Gauge,
            help: String::new(),
            label_keys: Vec::new(),
            data: MetricData::Gauge(HashMap::new()),
        });
        match &mut entry.data {
            MetricData::Gauge(by_label) => {
                by_label.insert(key, value);
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!("{name} is not a gauge"))),
        }
    }

    /// Increment a counter by `delta` (default 1.0 at the call site),
    /// optionally for a specific label tuple.
    pub fn increment_counter(
        &self,
        name: &str,
        delta: f64,
        labels: &[(&str, &str)],
    ) -> Result<()> {
        Self::check_name(name)?;
        let key = normalize_labels(labels);
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Counter,
            help: String::new(),
            label_keys: Vec::new(),
            data: MetricData::Counter(HashMap::new()),
        });
        match &mut entry.data {
            MetricData::Counter(by_label) => {
                *by_label.entry(key).or_insert(0.0) += delta;
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!("{name} is not a counter"))),
        }
    }

    /// Observe a histogram sample (unlabeled).
    pub fn observe_histogram(&self, name: &str, value: f64) -> Result<()> {
        Self::check_name(name)?;
        let mut metrics = self.metrics.write();
        let entry = metrics.entry(name.to_string()).or_insert_with(|| MetricEntry {
            kind: MetricKind::Histogram,
            help: String::new(),
            label_keys: Vec::new(),
            data: MetricData::Histogram(HistogramData::new(Vec::new())),
        });
        match &mut entry.data {
            MetricData::Histogram(hist) => {
                hist.observe(value);
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!("{name} is not a histogram"))),
        }
    }

    /// Current gauge value or counter total; `None` for histograms (use
    /// `get_histogram_stats`) and for unknown names.
    pub fn get_value(&self, name: &str) -> Option<f64> {
        let metrics = self.metrics.read();
        match &metrics.get(name)?.data {
            MetricData::Gauge(by_label) => by_label.get(&Vec::new()).copied(),
            MetricData::Counter(by_label) => Some(by_label.values().sum()),
            MetricData::Histogram(_) => None,
        }
    }

    /// `{count, sum}` for a histogram, or `None` if unknown/not a histogram.
    pub fn get_histogram_stats(&self, name: &str) -> Option<(u64, f64)> {
        let metrics = self.metrics.read();
        match &metrics.get(name)?.data {
            MetricData::Histogram(hist) => Some((hist.total_count, hist.sum)),
            _ => None,
        }
    }

    /// Value of one labeled counter tuple (0.0 if unseen), or the sum
    /// across all tuples if `labels` is empty.
    pub fn get_counter_value(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let metrics = self.metrics.read();
        let Some(entry) = metrics.get(name) else {
            return 0.0;
        };
        let MetricData::Counter(by_label) = &entry.data else {
            return 0.0;
        };
        if labels.is_empty() {
            by_label.values().sum()
        } else {
            let key = normalize_labels(labels);
            by_label.get(&key).copied().unwrap_or(0.0)
        }
    }

    /// Zero every value; registrations (and help/label metadata) survive.
    pub fn reset(&self) {
        let mut metrics = self.metrics.write();
        for entry in metrics.values_mut() {
            match &mut entry.data {
                MetricData::Gauge(by_label) => {
                    for v in by_label.values_mut() {
                        *v = 0.0;
                    }
                }
                MetricData::Counter(by_label) => {
                    for v in by_label.values_mut() {
                        *v = 0.0;
                    }
                }
                MetricData::Histogram(hist) => hist.reset(),
            }
        }
        debug!("metric registry reset");
    }

    /// A consistent point-in-time read of every registered metric.
    pub fn snapshot(&self) -> MetricSnapshot {
        let metrics = self.metrics.read();
        let mut snapshot = MetricSnapshot::default();
        for (name, entry) in metrics.iter() {
            match &entry.data {
                MetricData::Gauge(by_label) => {
                    snapshot.gauges.insert(name.clone(), by_label.clone());
                }
                MetricData::Counter(by_label) => {
                    snapshot.counters.insert(name.clone(), by_label.clone());
                }
                MetricData::Histogram(hist) => {
                    snapshot.histograms.insert(
                        name.clone(),
                        HistogramSnapshot {
                            buckets: hist.buckets.clone(),
                            bucket_counts: hist.bucket_counts.clone(),
                            count: hist.total_count,
                            sum: hist.sum,
                        },
                    );
                }
            }
        }
        snapshot
    }

    /// Prometheus text exposition format.
    pub fn export_text(&self) -> String {
        let metrics = self.metrics.read();
        let mut out = String::new();
        let mut names: Vec<&String> = metrics.keys().collect();
        names.sort();

        for name in names {
            let entry = &metrics[name];
            out.push_str(&format!("# HELP {} {}\n", name, entry.help));
            out.push_str(&format!("# TYPE {} {}\n", name, entry.kind.exposition_type()));

            match &entry.data {
                MetricData::Gauge(by_label) | MetricData::Counter(by_label) => {
                    let mut keys: Vec<&LabelSet> = by_label.keys().collect();
                    keys.sort();
                    for key in keys {
                        let value = by_label[key];
                        out.push_str(&format!("{}{} {}\n", name, format_labels(key), value));
                    }
                }
                MetricData::Histogram(hist) => {
                    for (boundary, count) in hist.buckets.iter().zip(hist.bucket_counts.iter()) {
                        out.push_str(&format!(
                            "{}_bucket{{le=\"{}\"}} {}\n",
                            name, boundary, count
                        ));
                    }
                    out.push_str(&format!(
                        "{}_bucket{{le=\"+Inf\"}} {}\n",
                        name, hist.total_count
                    ));
                    out.push_str(&format!("{}_sum {}\n", name, hist.sum));
                    out.push_str(&format!("{}_count {}\n", name, hist.total_count));
                }
            }
        }
        out
    }
}

fn format_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let registry = MetricRegistry::new();
        registry.register_gauge("shim_resume_success_rate", "resume rate").unwrap();
        registry.observe_gauge("shim_resume_success_rate", 0.5).unwrap();
        registry.register_gauge("shim_resume_success_rate", "different help").unwrap();
        assert_eq!(registry.get_value("shim_resume_success_rate"), Some(0.5));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let registry = MetricRegistry::new();
        let err = registry.register_gauge("9invalid", "bad").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn counter_sums_across_labels() {
        let registry = MetricRegistry::new();
        registry
            .register_counter("model_selections_total", "selections", &["model"])
            .unwrap();
        registry
            .increment_counter("model_selections_total", 3.0, &[("model", "haiku")])
            .unwrap();
        registry
            .increment_counter("model_selections_total", 7.0, &[("model", "opus")])
            .unwrap();
        assert_eq!(registry.get_counter_value("model_selections_total", &[]), 10.0);
        assert_eq!(
            registry.get_counter_value("model_selections_total", &[("model", "opus")]),
            7.0
        );
        assert_eq!(
            registry.get_counter_value("model_selections_total", &[("model", "sonnet")]),
            0.0
        );
    }

    #[test]
    fn histogram_stats_and_average() {
        let registry = MetricRegistry::new();
        registry
            .register_histogram("shim_checkpoint_creation_time", "checkpoint time", vec![50.0, 100.0, 200.0])
            .unwrap();
        for v in [30.0, 40.0, 50.0] {
            registry.observe_histogram("shim_checkpoint_creation_time", v).unwrap();
        }
        let (count, sum) = registry.get_histogram_stats("shim_checkpoint_creation_time").unwrap();
        assert_eq!(count, 3);
        assert_eq!(sum, 120.0);
        assert_eq!(registry.get_value("shim_checkpoint_creation_time"), None);
    }

    #[test]
    fn reset_zeroes_values_but_keeps_registration() {
        let registry = MetricRegistry::new();
        registry.register_gauge("g", "help").unwrap();
        registry.observe_gauge("g", 42.0).unwrap();
        registry.reset();
        assert_eq!(registry.get_value("g"), Some(0.0));
    }

    #[test]
    fn export_text_round_trips_name_type_value() {
        let registry = MetricRegistry::new();
        registry.register_gauge("shim_resume_success_rate", "resume rate").unwrap();
        registry.observe_gauge("shim_resume_success_rate", 0.93).unwrap();
        let text = registry.export_text();
        assert!(text.contains("# TYPE shim_resume_success_rate gauge"));
        assert!(text.contains("shim_resume_success_rate 0.93"));
    }

    #[test]
    fn snapshot_is_consistent_with_direct_reads() {
        let registry = MetricRegistry::new();
        registry.register_gauge("g", "help").unwrap();
        registry.observe_gauge("g", 1.5).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap.gauge("g"), Some(1.5));
    }
}

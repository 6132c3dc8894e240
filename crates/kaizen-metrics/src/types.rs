//! Metric shapes held by the registry

use std::collections::HashMap;

/// A distinct label tuple, sorted by key so two equivalent tuples compare equal
pub type LabelSet = Vec<(String, String)>;

pub(crate) fn normalize_labels(labels: &[(&str, &str)]) -> LabelSet {
    let mut pairs: LabelSet = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    pairs.sort();
    pairs
}

/// The three metric shapes the registry understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
}

impl MetricKind {
    pub fn exposition_type(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct HistogramData {
    pub buckets: Vec<f64>,
    pub bucket_counts: Vec<u64>,
    pub total_count: u64,
    pub sum: f64,
}

impl HistogramData {
    pub fn new(buckets: Vec<f64>) -> Self {
        let bucket_counts = vec![0u64; buckets.len()];
        Self {
            buckets,
            bucket_counts,
            total_count: 0,
            sum: 0.0,
        }
    }

    pub fn observe(&mut self, value: f64) {
        self.sum += value;
        self.total_count += 1;
        for (boundary, count) in self.buckets.iter().zip(self.bucket_counts.iter_mut()) {
            if value <= *boundary {
                *count += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.total_count = 0;
        self.sum = 0.0;
        for c in &mut self.bucket_counts {
            *c = 0;
        }
    }
}

/// Internal per-metric record held by the registry
#[derive(Debug, Clone)]
pub(crate) enum MetricData {
    Gauge(HashMap<LabelSet, f64>),
    Counter(HashMap<LabelSet, f64>),
    Histogram(HistogramData),
}

#[derive(Debug, Clone)]
pub(crate) struct MetricEntry {
    pub kind: MetricKind,
    pub help: String,
    pub label_keys: Vec<String>,
    pub data: MetricData,
}

/// A point-in-time read of the registry, used by `Snapshot`-consuming
/// components (the safety evaluator, the opportunity detector).
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub gauges: HashMap<String, HashMap<LabelSet, f64>>,
    pub counters: HashMap<String, HashMap<LabelSet, f64>>,
    pub histograms: HashMap<String, HistogramSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct HistogramSnapshot {
    pub buckets: Vec<f64>,
    pub bucket_counts: Vec<u64>,
    pub count: u64,
    pub sum: f64,
}

impl HistogramSnapshot {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl MetricSnapshot {
    /// Current value of a gauge (unlabeled / empty label tuple)
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).and_then(|by_label| by_label.get(&Vec::new())).copied()
    }

    /// Total of a counter across all label tuples
    pub fn counter_total(&self, name: &str) -> Option<f64> {
        self.counters
            .get(name)
            .map(|by_label| by_label.values().sum())
    }

    /// Value of one labeled counter tuple (0.0 if never observed)
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let key = normalize_labels(labels);
        self.counters
            .get(name)
            .and_then(|by_label| by_label.get(&key))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn histogram(&self, name: &str) -> Option<&HistogramSnapshot> {
        self.histograms.get(name)
    }
}

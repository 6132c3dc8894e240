//! Pattern memory: tracks how often each distinct pattern has surfaced.

use crate::types::PatternMemoryEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PatternMemory {
    entries: HashMap<String, PatternMemoryEntry>,
}

impl PatternMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a detection of `pattern`, refreshing `last_detected` and
    /// incrementing the hit count, or creating a fresh entry.
    pub fn record(&mut self, pattern: &str, now: DateTime<Utc>) {
        self.entries
            .entry(pattern.to_string())
            .and_modify(|e| {
                e.last_detected = now;
                e.count += 1;
                e.expired = false;
            })
            .or_insert_with(|| PatternMemoryEntry {
                pattern: pattern.to_string(),
                first_detected: now,
                last_detected: now,
                count: 1,
                expired: false,
            });
    }

    /// Flags entries whose `last_detected` is older than `expiry_ms` as
    /// expired. Non-destructive: expired entries remain in history.
    pub fn expire_stale(&mut self, now: DateTime<Utc>, expiry_ms: i64) {
        for entry in self.entries.values_mut() {
            let age = (now - entry.last_detected).num_milliseconds();
            if age > expiry_ms {
                entry.expired = true;
            }
        }
    }

    /// Full pattern history, including expired entries, sorted by
    /// pattern text for stable output.
    pub fn history(&self) -> Vec<PatternMemoryEntry> {
        let mut entries: Vec<PatternMemoryEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        entries
    }

    pub fn get(&self, pattern: &str) -> Option<&PatternMemoryEntry> {
        self.entries.get(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn repeated_pattern_increments_count_and_refreshes_last_detected() {
        let mut memory = PatternMemory::new();
        let t0 = Utc::now();
        memory.record("high crash rate", t0);
        memory.record("high crash rate", t0 + Duration::seconds(5));
        let entry = memory.get("high crash rate").unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.first_detected, t0);
        assert_eq!(entry.last_detected, t0 + Duration::seconds(5));
    }

    #[test]
    fn expiry_is_non_destructive() {
        let mut memory = PatternMemory::new();
        let t0 = Utc::now();
        memory.record("stale pattern", t0);
        memory.expire_stale(t0 + Duration::hours(48), 24 * 60 * 60 * 1000);
        let history = memory.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].expired);
    }
}

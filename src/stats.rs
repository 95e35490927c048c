//! Execution statistics for rules files, derivation queries, and updates.

use std::collections::HashMap;
use std::time::Duration;

/// What kind of operation a statistics record covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Rules,
    Construct,
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Rules => "rules",
            OperationKind::Construct => "CONSTRUCT",
            OperationKind::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative record for one named operation.
#[derive(Debug, Clone)]
pub struct ExecutionStats {
    pub name: String,
    pub kind: OperationKind,
    /// Number of invocations across all rounds
    pub invocations: usize,
    /// Total wall-clock time
    pub elapsed: Duration,
    /// Total new triples produced (updates never contribute)
    pub new_triples: usize,
}

/// Tracker keyed by display name.
#[derive(Debug, Default)]
pub struct StatsTracker {
    stats: HashMap<String, ExecutionStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, kind: OperationKind, new_triples: usize, elapsed: Duration) {
        let entry = self
            .stats
            .entry(name.to_string())
            .or_insert_with(|| ExecutionStats {
                name: name.to_string(),
                kind,
                invocations: 0,
                elapsed: Duration::ZERO,
                new_triples: 0,
            });

        entry.invocations += 1;
        entry.elapsed += elapsed;
        if kind != OperationKind::Update {
            entry.new_triples += new_triples;
        }
    }

    /// Records sorted by cumulative elapsed time, slowest first.
    pub fn sorted(&self) -> Vec<&ExecutionStats> {
        let mut records: Vec<&ExecutionStats> = self.stats.values().collect();
        records.sort_by(|a, b| b.elapsed.cmp(&a.elapsed).then_with(|| a.name.cmp(&b.name)));
        records
    }

    /// Total time and total new triples across all records.
    pub fn summary(&self) -> (Duration, usize) {
        let total_time = self.stats.values().map(|s| s.elapsed).sum();
        let total_triples = self.stats.values().map(|s| s.new_triples).sum();
        (total_time, total_triples)
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn clear(&mut self) {
        self.stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut tracker = StatsTracker::new();
        tracker.record("r", OperationKind::Rules, 5, Duration::from_millis(10));
        tracker.record("r", OperationKind::Rules, 2, Duration::from_millis(5));

        let sorted = tracker.sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].invocations, 2);
        assert_eq!(sorted[0].new_triples, 7);
        assert_eq!(sorted[0].elapsed, Duration::from_millis(15));
    }

    #[test]
    fn test_updates_never_count_triples() {
        let mut tracker = StatsTracker::new();
        tracker.record("u", OperationKind::Update, 99, Duration::from_millis(1));
        let (_, triples) = tracker.summary();
        assert_eq!(triples, 0);
    }

    #[test]
    fn test_sorted_by_descending_time() {
        let mut tracker = StatsTracker::new();
        tracker.record("fast", OperationKind::Construct, 1, Duration::from_millis(1));
        tracker.record("slow", OperationKind::Construct, 1, Duration::from_millis(50));

        let names: Vec<&str> = tracker.sorted().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);
    }
}

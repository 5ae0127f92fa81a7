//! Grouping of inbound process events into counted table entries.
//!
//! Events sharing the exact same `(name, date)` pair collapse into one
//! `GroupedEntry` whose counter tracks how many were seen. Entries keep the
//! position at which their group first appeared and are never removed.

use std::collections::HashMap;

use procview_adapters::ProcessEvent;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedEntry {
    pub name: String,
    pub date: String,
    pub n_processes: u64,
    /// Pid of the event that opened the group; later merges leave it alone.
    pub pid: u64,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted { position: usize },
    Merged { position: usize, n_processes: u64 },
}

#[derive(Debug, Default)]
pub struct Aggregator {
    entries: Vec<GroupedEntry>,
    index: HashMap<(String, String), usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: ProcessEvent) -> Applied {
        let key = (event.name, event.date);

        if let Some(&position) = self.index.get(&key) {
            let entry = &mut self.entries[position];
            entry.n_processes += 1;
            return Applied::Merged {
                position,
                n_processes: entry.n_processes,
            };
        }

        let position = self.entries.len();
        self.entries.push(GroupedEntry {
            name: key.0.clone(),
            date: key.1.clone(),
            n_processes: 1,
            pid: event.pid,
        });
        self.index.insert(key, position);
        Applied::Inserted { position }
    }

    pub fn snapshot(&self) -> Vec<GroupedEntry> {
        self.entries.clone()
    }

    /// Events folded in so far, across all groups.
    pub fn total_processes(&self) -> u64 {
        self.entries.iter().map(|entry| entry.n_processes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, pid: u64, date: &str, n_processes: u64) -> GroupedEntry {
        GroupedEntry {
            name: name.to_string(),
            date: date.to_string(),
            n_processes,
            pid,
        }
    }

    fn aggregate(events: Vec<ProcessEvent>) -> Aggregator {
        let mut aggregator = Aggregator::new();
        for event in events {
            aggregator.apply(event);
        }
        aggregator
    }

    #[test]
    fn repeated_pair_merges_and_keeps_first_pid() {
        let aggregator = aggregate(vec![
            ProcessEvent::new("A", 100, "2024-01-01"),
            ProcessEvent::new("A", 200, "2024-01-01"),
        ]);
        assert_eq!(
            aggregator.snapshot(),
            vec![entry("A", 100, "2024-01-01", 2)]
        );
    }

    #[test]
    fn different_names_stay_separate_in_arrival_order() {
        let aggregator = aggregate(vec![
            ProcessEvent::new("A", 1, "d1"),
            ProcessEvent::new("B", 2, "d1"),
        ]);
        assert_eq!(
            aggregator.snapshot(),
            vec![entry("A", 1, "d1", 1), entry("B", 2, "d1", 1)]
        );
    }

    #[test]
    fn different_dates_are_not_merged() {
        let aggregator = aggregate(vec![
            ProcessEvent::new("A", 1, "d1"),
            ProcessEvent::new("A", 1, "d2"),
        ]);
        assert_eq!(
            aggregator.snapshot(),
            vec![entry("A", 1, "d1", 1), entry("A", 1, "d2", 1)]
        );
    }

    #[test]
    fn empty_input_gives_empty_snapshot() {
        let aggregator = Aggregator::new();
        assert_eq!(aggregator.snapshot(), vec![]);
        assert_eq!(aggregator.total_processes(), 0);
    }

    #[test]
    fn fifty_pairs_repeated_once_each() {
        let pairs: Vec<(String, String)> = (0..50)
            .map(|i| (format!("proc-{}", i % 7), format!("2024-01-{:02}", i / 7 + 1)))
            .collect();

        let mut events: Vec<ProcessEvent> = pairs
            .iter()
            .enumerate()
            .map(|(i, (name, date))| ProcessEvent::new(name.clone(), i as u64, date.clone()))
            .collect();
        events.extend(
            pairs
                .iter()
                .rev()
                .map(|(name, date)| ProcessEvent::new(name.clone(), 9999, date.clone())),
        );

        let aggregator = aggregate(events);
        let expected: Vec<GroupedEntry> = pairs
            .iter()
            .enumerate()
            .map(|(i, (name, date))| entry(name, i as u64, date, 2))
            .collect();
        assert_eq!(aggregator.snapshot(), expected);
        assert_eq!(aggregator.total_processes(), 100);
    }

    #[test]
    fn keys_compare_exactly() {
        let aggregator = aggregate(vec![
            ProcessEvent::new("nginx", 1, "2024-01-01"),
            ProcessEvent::new("Nginx", 2, "2024-01-01"),
            ProcessEvent::new("nginx ", 3, "2024-01-01"),
            ProcessEvent::new("nginx", 4, "2024-01-01T00:00:00"),
        ]);
        assert_eq!(aggregator.snapshot().len(), 4);
    }

    #[test]
    fn merge_keeps_position_and_reports_count() {
        let mut aggregator = Aggregator::new();
        assert_eq!(
            aggregator.apply(ProcessEvent::new("a", 1, "d")),
            Applied::Inserted { position: 0 }
        );
        assert_eq!(
            aggregator.apply(ProcessEvent::new("b", 2, "d")),
            Applied::Inserted { position: 1 }
        );
        for expected in 2..=5 {
            assert_eq!(
                aggregator.apply(ProcessEvent::new("a", 7, "d")),
                Applied::Merged {
                    position: 0,
                    n_processes: expected
                }
            );
        }
        let snapshot = aggregator.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snapshot[0].pid, 1);
    }

    #[test]
    fn counts_match_input_multiplicity() {
        // Deterministic pseudo-random stream over a small key space.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut events = Vec::new();
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            events.push(ProcessEvent::new(
                format!("p{}", seed % 5),
                seed % 1000,
                format!("d{}", (seed >> 8) % 3),
            ));
        }

        let mut expected: HashMap<(String, String), u64> = HashMap::new();
        let mut first_seen: Vec<(String, String)> = Vec::new();
        for event in &events {
            let key = (event.name.clone(), event.date.clone());
            if !expected.contains_key(&key) {
                first_seen.push(key.clone());
            }
            *expected.entry(key).or_default() += 1;
        }

        let aggregator = aggregate(events);
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.len(), expected.len());
        for (entry, key) in snapshot.iter().zip(&first_seen) {
            assert_eq!((&entry.name, &entry.date), (&key.0, &key.1));
            assert_eq!(entry.n_processes, expected[key]);
        }
        assert_eq!(aggregator.total_processes(), 500);
    }
}

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::processor::Mode;

pub const DEFAULT_CAPACITY: usize = 50;

/// A finished operation before the store has stamped it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Processed {
    pub input: String,
    pub output: String,
    pub mode: Mode,
    pub processing_time: u64,
}

/// One completed processing record. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingEntry {
    pub id: u64,
    pub input: String,
    pub output: String,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds, including the artificial delay.
    pub processing_time: u64,
}

/// Newest-first log of processing entries, bounded to `capacity`.
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<ProcessingEntry>,
    capacity: usize,
    next_id: u64,
    lifetime_operations: u64,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryStore {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
            lifetime_operations: 0,
        }
    }

    pub fn add(&mut self, processed: Processed) -> &ProcessingEntry {
        self.add_at(processed, Utc::now())
    }

    /// Stamps the entry with a fresh id and `timestamp`, then drops whatever
    /// falls off the tail.
    pub fn add_at(&mut self, processed: Processed, timestamp: DateTime<Utc>) -> &ProcessingEntry {
        let entry = ProcessingEntry {
            id: self.next_id,
            input: processed.input,
            output: processed.output,
            mode: processed.mode,
            timestamp,
            processing_time: processed.processing_time,
        };
        self.next_id += 1;
        self.lifetime_operations += 1;

        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Ids keep counting after a clear.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lifetime_operations = 0;
    }

    pub fn snapshot(&self) -> Vec<ProcessingEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessingEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Operations recorded since construction or the last clear, evicted
    /// ones included.
    pub fn lifetime_operations(&self) -> u64 {
        self.lifetime_operations
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        HistoryStore::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(n: usize) -> Processed {
        Processed {
            input: format!("input {n}"),
            output: format!("output {n}"),
            mode: Mode::Uppercase,
            processing_time: 500 + n as u64,
        }
    }

    #[test]
    fn add_prepends_and_stamps() {
        let mut history = HistoryStore::default();
        let first_id = history.add(processed(1)).id;
        let second_id = history.add(processed(2)).id;

        assert!(second_id > first_id);
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].input, "input 2");
        assert_eq!(snapshot[1].input, "input 1");
        assert!(snapshot[0].timestamp >= snapshot[1].timestamp);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = HistoryStore::default();
        for n in 0..51 {
            history.add(processed(n));
            assert!(history.len() <= DEFAULT_CAPACITY);
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 50);
        assert!(snapshot.iter().all(|e| e.input != "input 0"));
        // newest first, remaining 50 in insertion order
        for (i, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.input, format!("input {}", 50 - i));
        }
        assert_eq!(history.lifetime_operations(), 51);
    }

    #[test]
    fn clear_empties_and_keeps_ids_unique() {
        let mut history = HistoryStore::new(3);
        let before = history.add(processed(1)).id;
        history.clear();

        assert!(history.snapshot().is_empty());
        assert!(history.is_empty());
        assert_eq!(history.lifetime_operations(), 0);

        let after = history.add(processed(2)).id;
        assert!(after > before);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = HistoryStore::new(0);
        history.add(processed(1));
        history.add(processed(2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot()[0].input, "input 2");
    }

    #[test]
    fn entry_serializes_with_mode_id() {
        let mut history = HistoryStore::default();
        let entry = history.add(processed(7)).clone();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["mode"], "uppercase");
        assert_eq!(json["processing_time"], 507);
    }
}

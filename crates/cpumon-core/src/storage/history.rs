//! Bounded rolling history of snapshots.

use std::collections::VecDeque;

use super::model::Snapshot;

/// Append-only FIFO buffer of snapshots, oldest first.
///
/// Never holds more than `capacity` entries; pushing into a full buffer
/// evicts the oldest.
#[derive(Debug, Clone)]
pub struct CollectorHistory {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl CollectorHistory {
    /// Creates an empty history. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Snapshot> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Every entry, oldest first.
    pub fn all(&self) -> Vec<Snapshot> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
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

    /// Changes the capacity, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: f64) -> Snapshot {
        Snapshot::new(ts)
    }

    fn timestamps(items: &[Snapshot]) -> Vec<f64> {
        items.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = CollectorHistory::new(3);
        for ts in 1..=5 {
            history.push(snap(ts as f64));
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(timestamps(&history.all()), vec![3.0, 4.0, 5.0]);
        assert_eq!(history.latest().map(|s| s.timestamp), Some(5.0));
    }

    #[test]
    fn test_recent_bounds() {
        let mut history = CollectorHistory::new(10);
        for ts in 1..=4 {
            history.push(snap(ts as f64));
        }
        assert_eq!(timestamps(&history.recent(2)), vec![3.0, 4.0]);
        assert_eq!(history.recent(100).len(), 4);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn test_set_capacity_shrinks_immediately() {
        let mut history = CollectorHistory::new(5);
        for ts in 1..=5 {
            history.push(snap(ts as f64));
        }
        history.set_capacity(2);
        assert_eq!(history.capacity(), 2);
        assert_eq!(timestamps(&history.all()), vec![4.0, 5.0]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut history = CollectorHistory::new(0);
        history.push(snap(1.0));
        history.push(snap(2.0));
        assert_eq!(history.capacity(), 1);
        assert_eq!(timestamps(&history.all()), vec![2.0]);
    }

    #[test]
    fn test_clear() {
        let mut history = CollectorHistory::new(3);
        history.push(snap(1.0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}

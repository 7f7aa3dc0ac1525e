// src/history.rs
//
// =============================================================================
// WORKSHOPNET: BOUNDED HISTORY (v 0.3 )
// =============================================================================
//
// A capacity-bounded FIFO for firing records.
// It never grows past its capacity: pushing into a full buffer evicts the
// oldest entry first, so memory stays flat under heavy firing load.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// A zero capacity is bumped to one. Storage grows on demand up to
    /// `capacity`; only a default-sized block is reserved up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Rebuilds from stored entries (oldest first), keeping only the newest
    /// `capacity` of them.
    pub fn from_entries(capacity: usize, entries: impl IntoIterator<Item = T>) -> Self {
        let mut history = Self::new(capacity);
        for e in entries {
            history.push(e);
        }
        history
    }

    /// Adds an entry, dropping the oldest if full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
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
}

impl<T> Default for BoundedHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// Stored as a plain array; the capacity comes from configuration on load.
impl<T: Serialize> Serialize for BoundedHistory<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_first() {
        let mut h = BoundedHistory::new(3);
        for i in 0..5 {
            h.push(i);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(h.last(), Some(&4));
    }

    #[test]
    fn never_exceeds_default_capacity() {
        let mut h = BoundedHistory::default();
        for i in 0..(DEFAULT_HISTORY_CAPACITY * 3) {
            h.push(i);
            assert!(h.len() <= DEFAULT_HISTORY_CAPACITY);
        }
        assert_eq!(h.iter().next(), Some(&(DEFAULT_HISTORY_CAPACITY * 2)));
    }

    #[test]
    fn from_entries_trims_to_capacity() {
        let h = BoundedHistory::from_entries(2, vec!["a", "b", "c"]);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let h = BoundedHistory::from_entries(10, 0..7);
        assert_eq!(h.recent(3).copied().collect::<Vec<_>>(), vec![4, 5, 6]);
        assert_eq!(h.recent(50).count(), 7);
    }

    #[test]
    fn serializes_as_plain_array() {
        let h = BoundedHistory::from_entries(4, vec![1, 2]);
        assert_eq!(serde_json::to_string(&h).unwrap(), "[1,2]");
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let mut h = BoundedHistory::new(usize::MAX);
        assert_eq!(h.capacity(), usize::MAX);
        for i in 0..(DEFAULT_HISTORY_CAPACITY + 5) {
            h.push(i);
        }
        assert_eq!(h.len(), DEFAULT_HISTORY_CAPACITY + 5);
        assert_eq!(h.iter().next(), Some(&0));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut h = BoundedHistory::new(0);
        h.push(1);
        h.push(2);
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2]);
    }
}

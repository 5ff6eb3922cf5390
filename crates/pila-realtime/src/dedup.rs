//! # Observer-Side Deduplication
//!
//! The required duplicate-suppression contract at the synchronizer
//! boundary.
//!
//! ## Why This Exists
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  At-Least-Once + Dedup = Exactly-Once Effect            │
//! │                                                                         │
//! │  The hub may deliver an event more than once (reconnects, replays).    │
//! │  Every event carries a stable eventId. An observer runs every          │
//! │  incoming envelope through SeenEvents BEFORE applying it:              │
//! │                                                                         │
//! │    if seen.insert(&envelope.event_id) {                                │
//! │        apply(envelope.event);      // first time: apply                │
//! │    } else {                                                             │
//! │        // duplicate: silently dropped, NEVER reapplied                 │
//! │    }                                                                    │
//! │                                                                         │
//! │  The set is bounded: oldest ids fall out first. Capacity only needs    │
//! │  to cover the redelivery window, not history - an id old enough to     │
//! │  be evicted is also old enough that the snapshot has superseded it.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashSet, VecDeque};

/// Default number of event ids an observer remembers.
pub const DEFAULT_SEEN_CAPACITY: usize = 1024;

// =============================================================================
// Seen Events
// =============================================================================

/// Bounded set of recently seen event identifiers.
#[derive(Debug)]
pub struct SeenEvents {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenEvents {
    /// Creates a dedup set with the default capacity.
    pub fn new() -> Self {
        SeenEvents::with_capacity(DEFAULT_SEEN_CAPACITY)
    }

    /// Creates a dedup set remembering at most `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        SeenEvents {
            capacity: capacity.max(1),
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Records an event id.
    ///
    /// ## Returns
    /// * `true` - first sighting; the observer should apply the event
    /// * `false` - duplicate; the observer must drop it
    pub fn insert(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(event_id.to_string());
        self.order.push_back(event_id.to_string());
        true
    }

    /// True if the id has been seen (without recording it).
    pub fn contains(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }

    /// Forgets everything. Called when a snapshot replaces the observer's
    /// state: ids older than the snapshot no longer matter.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SeenEvents {
    fn default() -> Self {
        SeenEvents::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_applies_duplicate_drops() {
        let mut seen = SeenEvents::new();

        assert!(seen.insert("cust-1:1"));
        assert!(!seen.insert("cust-1:1"), "duplicate must be dropped");
        assert!(seen.insert("cust-1:2"), "next revision is a new event");
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut seen = SeenEvents::with_capacity(2);

        assert!(seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c")); // evicts "a"

        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
        assert_eq!(seen.len(), 2);

        // "a" would now be applied again - acceptable, because an id that
        // old is covered by a newer snapshot
        assert!(seen.insert("a"));
    }

    #[test]
    fn test_clear_on_snapshot() {
        let mut seen = SeenEvents::new();
        seen.insert("cust-1:1");
        seen.insert("stl-42");

        seen.clear();
        assert!(seen.is_empty());
        assert!(seen.insert("cust-1:1"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut seen = SeenEvents::with_capacity(0);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
    }
}

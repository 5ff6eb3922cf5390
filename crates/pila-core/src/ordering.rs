//! # Queue Ordering
//!
//! The pure comparator that defines queue position.
//!
//! ## Ordering Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Position Computation                               │
//! │                                                                         │
//! │  Position is computed on the READ path, never stored.                  │
//! │                                                                         │
//! │  1. Entries with manual_position sort first, by that position asc      │
//! │     (staff reorder pins them ahead of automatic ordering until the     │
//! │      next priority recompute clears manual_position)                   │
//! │                                                                         │
//! │  2. Automatic entries sort by:                                         │
//! │       priority_score  DESC   (priority lane first)                     │
//! │       created_at      ASC    (FIFO tie-break)                          │
//! │       token_number    ASC    (total order, same-instant registrations) │
//! │                                                                         │
//! │  Example:                                                              │
//! │    manual_position=0            → position 1                           │
//! │    manual_position=1            → position 2                           │
//! │    score=200, created 09:05     → position 3                           │
//! │    score=100, created 09:01     → position 4                           │
//! │    score=0,   created 08:59     → position 5                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Ordering;

use crate::types::QueueEntry;

// =============================================================================
// Comparator
// =============================================================================

/// Compares two Waiting entries for queue position.
///
/// Manually positioned entries come before automatic ones; among manual
/// entries the staff-assigned index wins; among automatic entries the
/// priority score (descending) then registration time (ascending) decide.
/// Token number is the final tie-break so the order is total.
pub fn compare_waiting(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    match (a.manual_position, b.manual_position) {
        (Some(ma), Some(mb)) => ma
            .cmp(&mb)
            .then_with(|| a.token_number.cmp(&b.token_number)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b
            .priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.token_number.cmp(&b.token_number)),
    }
}

/// Sorts a Waiting set into queue order in place.
pub fn sort_waiting(entries: &mut [QueueEntry]) {
    entries.sort_by(compare_waiting);
}

// =============================================================================
// Unit Tests
// =============================================================================

//! Bounded recency tracker for one (project, environment) group.
//!
//! [`RetentionTracker`] keeps the `N` most recently deployed distinct
//! releases it has seen. It is an LRU keyed by release id where "use" means
//! "deployed with a strictly newer timestamp".
//!
//! # Layout
//!
//! Entries live in an arena (`Vec<Slot>`) and are threaded into a doubly
//! linked list through `prev`/`next` slot indices, most recent at `head`.
//! A `HashMap` from release id to slot index gives O(1) lookup, so insert,
//! move-to-front and evict-from-tail are all O(1).
//!
//! When the tracker is full, the tail slot is recycled in place for the new
//! entry. The arena therefore never holds more than `capacity` slots and no
//! free list is needed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RetentionError;

/// The most recent deployment recorded for one release in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedEntry {
    pub release_id: String,
    pub environment_id: String,
    pub deployed_on: DateTime<Utc>,
}

/// What a single [`RetentionTracker::track`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A release not seen before was added at the most-recent position.
    /// `evicted` holds the least recent entry if capacity was exceeded.
    Inserted { evicted: Option<TrackedEntry> },
    /// A tracked release got a strictly newer deployment and moved to the
    /// most-recent position. `previous` is the timestamp it replaced.
    Refreshed { previous: DateTime<Utc> },
    /// The deployment was not newer than the recorded one; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: TrackedEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Keeps the `capacity` most recently deployed distinct releases.
#[derive(Debug, Clone)]
pub struct RetentionTracker {
    capacity: usize,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

/// Convert a signed releases-to-keep value into a tracker capacity.
///
/// # Errors
///
/// Returns [`RetentionError::InvalidCapacity`] for zero or negative values.
pub fn validate_capacity(requested: i64) -> Result<usize, RetentionError> {
    usize::try_from(requested)
        .ok()
        .filter(|capacity| *capacity >= 1)
        .ok_or(RetentionError::InvalidCapacity { requested })
}

impl RetentionTracker {
    /// Create an empty tracker holding at most `capacity` releases.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, RetentionError> {
        if capacity == 0 {
            return Err(RetentionError::InvalidCapacity { requested: 0 });
        }

        Ok(Self {
            capacity,
            slots: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        })
    }

    /// Record a deployment of `release_id` into `environment_id`.
    ///
    /// - Unknown release: inserted as most recent. If that exceeds capacity,
    ///   the least recently deployed release is evicted.
    /// - Known release with a strictly newer `deployed_on`: its environment
    ///   and timestamp are updated and it moves to the most-recent position.
    /// - Known release with an older or equal `deployed_on`: no-op.
    pub fn track(
        &mut self,
        release_id: &str,
        environment_id: &str,
        deployed_on: DateTime<Utc>,
    ) -> TrackOutcome {
        if let Some(&slot) = self.index.get(release_id) {
            let entry = &mut self.slots[slot].entry;
            if deployed_on <= entry.deployed_on {
                return TrackOutcome::Stale;
            }

            let previous = entry.deployed_on;
            entry.deployed_on = deployed_on;
            if entry.environment_id != environment_id {
                environment_id.clone_into(&mut entry.environment_id);
            }

            self.move_to_front(slot);
            return TrackOutcome::Refreshed { previous };
        }

        let entry = TrackedEntry {
            release_id: release_id.to_owned(),
            environment_id: environment_id.to_owned(),
            deployed_on,
        };

        match self.tail {
            Some(slot) if self.index.len() >= self.capacity => {
                self.detach(slot);
                let evicted = std::mem::replace(&mut self.slots[slot].entry, entry);
                self.index.remove(&evicted.release_id);
                self.index.insert(release_id.to_owned(), slot);
                self.push_front(slot);
                TrackOutcome::Inserted {
                    evicted: Some(evicted),
                }
            }
            _ => {
                let slot = self.slots.len();
                self.slots.push(Slot {
                    entry,
                    prev: None,
                    next: None,
                });
                self.index.insert(release_id.to_owned(), slot);
                self.push_front(slot);
                TrackOutcome::Inserted { evicted: None }
            }
        }
    }

    /// Tracked release ids, most recently deployed first.
    pub fn retained_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|entry| entry.release_id.as_str())
    }

    /// Tracked entries, most recently deployed first.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
            remaining: self.index.len(),
        }
    }

    /// The recorded entry for `release_id`, if tracked.
    #[must_use]
    pub fn get(&self, release_id: &str) -> Option<&TrackedEntry> {
        self.index
            .get(release_id)
            .map(|&slot| &self.slots[slot].entry)
    }

    #[must_use]
    pub fn contains(&self, release_id: &str) -> bool {
        self.index.contains_key(release_id)
    }

    /// The entry that would be evicted next.
    #[must_use]
    pub fn least_recent(&self) -> Option<&TrackedEntry> {
        self.tail.map(|slot| &self.slots[slot].entry)
    }

    #[must_use]
    pub fn most_recent(&self) -> Option<&TrackedEntry> {
        self.head.map(|slot| &self.slots[slot].entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.detach(slot);
        self.push_front(slot);
    }

    /// Unlink `slot` from the list, patching its neighbours and head/tail.
    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.slots[slot];
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }

        let node = &mut self.slots[slot];
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = &mut self.slots[slot];
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head {
            self.slots[old_head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

/// Iterator over a tracker's entries in recency order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    slots: &'a [Slot],
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TrackedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let slots = self.slots;
        let node = &slots[self.cursor?];
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(&node.entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a RetentionTracker {
    type Item = &'a TrackedEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .expect("valid base time")
            + Duration::hours(hour)
    }

    fn ids(tracker: &RetentionTracker) -> Vec<&str> {
        tracker.retained_ids().collect()
    }

    /// Walk the list backwards from `tail` and check it mirrors `head` order.
    fn assert_links_consistent(tracker: &RetentionTracker) {
        let forward: Vec<usize> = {
            let mut out = Vec::new();
            let mut cursor = tracker.head;
            while let Some(slot) = cursor {
                out.push(slot);
                cursor = tracker.slots[slot].next;
            }
            out
        };
        let mut backward: Vec<usize> = {
            let mut out = Vec::new();
            let mut cursor = tracker.tail;
            while let Some(slot) = cursor {
                out.push(slot);
                cursor = tracker.slots[slot].prev;
            }
            out
        };
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), tracker.len());
        for (release_id, &slot) in &tracker.index {
            assert_eq!(&tracker.slots[slot].entry.release_id, release_id);
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = RetentionTracker::new(0).expect_err("capacity 0");
        assert_eq!(err, RetentionError::InvalidCapacity { requested: 0 });
    }

    #[test]
    fn validate_capacity_rejects_non_positive() {
        assert_eq!(validate_capacity(3), Ok(3));
        assert_eq!(
            validate_capacity(0),
            Err(RetentionError::InvalidCapacity { requested: 0 })
        );
        assert_eq!(
            validate_capacity(-4),
            Err(RetentionError::InvalidCapacity { requested: -4 })
        );
    }

    #[test]
    fn empty_tracker_yields_nothing() {
        let tracker = RetentionTracker::new(2).expect("tracker");
        assert!(tracker.is_empty());
        assert_eq!(tracker.iter().len(), 0);
        assert!(tracker.most_recent().is_none());
        assert!(tracker.least_recent().is_none());
    }

    #[test]
    fn inserts_most_recent_first() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        tracker.track("r3", "env", at(3));

        assert_eq!(ids(&tracker), ["r3", "r2", "r1"]);
        assert_eq!(tracker.iter().len(), 3);
        assert_links_consistent(&tracker);
    }

    #[test]
    fn overflow_evicts_least_recent() {
        let mut tracker = RetentionTracker::new(2).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        let outcome = tracker.track("r3", "env", at(3));

        let evicted = match outcome {
            TrackOutcome::Inserted {
                evicted: Some(evicted),
            } => evicted,
            other => panic!("expected eviction, got {other:?}"),
        };
        assert_eq!(evicted.release_id, "r1");
        assert_eq!(ids(&tracker), ["r3", "r2"]);
        assert!(!tracker.contains("r1"));
        assert_links_consistent(&tracker);
    }

    #[test]
    fn eviction_recycles_tail_slot() {
        let mut tracker = RetentionTracker::new(2).expect("tracker");
        for hour in 0..50 {
            tracker.track(&format!("r{hour}"), "env", at(hour));
        }
        assert_eq!(tracker.slots.len(), 2);
        assert_eq!(ids(&tracker), ["r49", "r48"]);
        assert_links_consistent(&tracker);
    }

    #[test]
    fn newer_deployment_refreshes_and_moves_to_front() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "staging", at(1));
        tracker.track("r2", "staging", at(2));

        let outcome = tracker.track("r1", "production", at(5));
        assert_eq!(outcome, TrackOutcome::Refreshed { previous: at(1) });
        assert_eq!(ids(&tracker), ["r1", "r2"]);

        let entry = tracker.get("r1").expect("r1 tracked");
        assert_eq!(entry.environment_id, "production");
        assert_eq!(entry.deployed_on, at(5));
        assert_links_consistent(&tracker);
    }

    #[test]
    fn refreshed_release_survives_next_eviction() {
        let mut tracker = RetentionTracker::new(2).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        tracker.track("r1", "env", at(3));
        tracker.track("r3", "env", at(4));

        assert_eq!(ids(&tracker), ["r3", "r1"]);
        assert_links_consistent(&tracker);
    }

    #[test]
    fn equal_timestamp_is_stale() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "staging", at(1));
        tracker.track("r2", "staging", at(2));

        let outcome = tracker.track("r1", "production", at(1));
        assert_eq!(outcome, TrackOutcome::Stale);
        assert_eq!(ids(&tracker), ["r2", "r1"]);
        assert_eq!(
            tracker.get("r1").map(|e| e.environment_id.as_str()),
            Some("staging")
        );
    }

    #[test]
    fn older_timestamp_is_stale() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "env", at(4));
        tracker.track("r2", "env", at(5));

        assert_eq!(tracker.track("r1", "env", at(2)), TrackOutcome::Stale);
        assert_eq!(tracker.get("r1").map(|e| e.deployed_on), Some(at(4)));
        assert_eq!(ids(&tracker), ["r2", "r1"]);
    }

    #[test]
    fn refreshing_head_keeps_order() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        tracker.track("r2", "env", at(3));

        assert_eq!(ids(&tracker), ["r2", "r1"]);
        assert_eq!(tracker.most_recent().map(|e| e.deployed_on), Some(at(3)));
        assert_eq!(tracker.least_recent().map(|e| e.release_id.as_str()), Some("r1"));
        assert_links_consistent(&tracker);
    }

    #[test]
    fn refreshing_tail_updates_tail() {
        let mut tracker = RetentionTracker::new(3).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        tracker.track("r3", "env", at(3));
        tracker.track("r1", "env", at(4));

        assert_eq!(ids(&tracker), ["r1", "r3", "r2"]);
        assert_eq!(tracker.least_recent().map(|e| e.release_id.as_str()), Some("r2"));
        assert_links_consistent(&tracker);
    }

    #[test]
    fn capacity_one_keeps_only_latest() {
        let mut tracker = RetentionTracker::new(1).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));
        tracker.track("r2", "env", at(3));

        assert_eq!(ids(&tracker), ["r2"]);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.capacity(), 1);
        assert_links_consistent(&tracker);
    }

    #[test]
    fn into_iterator_matches_iter() {
        let mut tracker = RetentionTracker::new(2).expect("tracker");
        tracker.track("r1", "env", at(1));
        tracker.track("r2", "env", at(2));

        let via_ref: Vec<&str> = (&tracker)
            .into_iter()
            .map(|e| e.release_id.as_str())
            .collect();
        assert_eq!(via_ref, ids(&tracker));
    }
}

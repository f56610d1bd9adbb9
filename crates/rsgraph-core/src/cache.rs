//! # Temporal Cache
//!
//! A generic time-indexed history store with a bounded retention window.
//!
//! Entries are kept in strictly descending time-stamp order: the newer
//! the entry, the closer to the front. Insertions past the retention
//! window (relative to the then-newest entry) and duplicate time stamps
//! are rejected. After every successful insertion, entries older than
//! `newest - max_history_duration` are purged from the tail.
//!
//! Retrieval never interpolates. Queries beyond either end of a
//! non-empty cache clamp to the boundary entry; only an empty cache
//! reports "no data".

use tracing::{error, warn};

use crate::time::{Duration, TimeStamp};

// =============================================================================
// ACCESS POLICY
// =============================================================================

/// How a query time stamp is resolved against stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Nearest entry by absolute temporal distance; an exact tie
    /// between two neighbors resolves to the newer one.
    #[default]
    Closest,
    /// Nearest entry that is not newer than the query. Queries older
    /// than the oldest entry clamp to the oldest entry.
    Preceding,
}

// =============================================================================
// TEMPORAL CACHE
// =============================================================================

/// A bounded history of `(value, time stamp)` pairs.
///
/// The cache layout is descending by time:
///
/// ```text
///   newest              oldest
///    |-------------------|
///   front               back
/// ```
#[derive(Debug, Clone)]
pub struct TemporalCache<T> {
    /// History entries, strictly descending by time stamp.
    history: Vec<(T, TimeStamp)>,
    /// Size of the retention window.
    max_history_duration: Duration,
}

impl<T> TemporalCache<T> {
    /// Default retention window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_seconds(10.0);

    /// Create a cache with the given retention window.
    /// Negative windows are replaced by the default, with an error log.
    #[must_use]
    pub fn new(max_history_duration: Duration) -> Self {
        let mut cache = Self {
            history: Vec::new(),
            max_history_duration: Self::DEFAULT_WINDOW,
        };
        cache.set_max_history_duration(max_history_duration);
        cache
    }

    /// Insert a time-stamped value at its temporal position.
    ///
    /// Returns `false` without modifying the cache when the stamp is a
    /// duplicate of an existing entry or already falls outside the
    /// retention window relative to the newest stored entry.
    pub fn insert(&mut self, value: T, stamp: TimeStamp) -> bool {
        if let Some((_, newest)) = self.history.first() {
            if stamp < *newest - self.max_history_duration {
                warn!(
                    stamp = stamp.as_seconds(),
                    limit = (*newest - self.max_history_duration).as_seconds(),
                    "cannot insert entry older than the cache limit, skipping it"
                );
                return false;
            }
        }

        // Descending scan for the insertion point.
        let mut position = self.history.len();
        for (index, (_, stored)) in self.history.iter().enumerate() {
            if *stored <= stamp {
                if *stored == stamp {
                    warn!(
                        stamp = stamp.as_seconds(),
                        "entry at this time stamp exists already, skipping it"
                    );
                    return false;
                }
                position = index;
                break;
            }
        }
        self.history.insert(position, (value, stamp));

        // The freshly inserted entry may have moved the window forward.
        if let Some((_, newest)) = self.history.first() {
            let reference = *newest;
            self.delete_outdated(reference);
        }
        true
    }

    /// Resolve a query time stamp against the cache.
    /// Returns `None` only when the cache is empty.
    #[must_use]
    pub fn get(&self, stamp: TimeStamp, policy: AccessPolicy) -> Option<&T> {
        if self.history.is_empty() {
            warn!(
                stamp = stamp.as_seconds(),
                "temporal cache is empty, cannot resolve query"
            );
            return None;
        }
        let index = match policy {
            AccessPolicy::Closest => self.closest_index(stamp),
            AccessPolicy::Preceding => self.preceding_index(stamp),
        };
        self.history.get(index).map(|(value, _)| value)
    }

    /// Index of the temporally closest entry; ties go to the newer one.
    fn closest_index(&self, stamp: TimeStamp) -> usize {
        for (index, (_, stored)) in self.history.iter().enumerate() {
            if stamp >= *stored {
                if index == 0 {
                    return 0;
                }
                // A newer neighbor exists; pick whichever is closer.
                let newer = self.history[index - 1].1;
                if (newer - stamp).abs() <= (stamp - *stored).abs() {
                    return index - 1;
                }
                return index;
            }
        }
        // Query is older than the oldest entry: clamp to the tail.
        self.history.len() - 1
    }

    /// Index of the first entry not newer than the query.
    fn preceding_index(&self, stamp: TimeStamp) -> usize {
        for (index, (_, stored)) in self.history.iter().enumerate() {
            if stamp >= *stored {
                return index;
            }
        }
        self.history.len() - 1
    }

    /// Drop all entries older than `reference - max_history_duration`.
    ///
    /// Callers passing a reference other than the cache's own latest
    /// stamp (e.g. the current system time) may flush the cache
    /// completely.
    pub fn delete_outdated(&mut self, reference: TimeStamp) {
        while let Some((_, oldest)) = self.history.last() {
            if *oldest + self.max_history_duration < reference {
                self.history.pop();
            } else {
                break;
            }
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Completely flush the cache.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Iterate entries newest to oldest. Reverse for oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&T, TimeStamp)> {
        self.history.iter().map(|(value, stamp)| (value, *stamp))
    }

    /// The newest entry, if any.
    #[must_use]
    pub fn latest(&self) -> Option<(&T, TimeStamp)> {
        self.history.first().map(|(value, stamp)| (value, *stamp))
    }

    /// The oldest entry, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<(&T, TimeStamp)> {
        self.history.last().map(|(value, stamp)| (value, *stamp))
    }

    /// The newest stored time stamp, if any.
    #[must_use]
    pub fn latest_timestamp(&self) -> Option<TimeStamp> {
        self.history.first().map(|(_, stamp)| *stamp)
    }

    /// The oldest stored time stamp, if any.
    #[must_use]
    pub fn oldest_timestamp(&self) -> Option<TimeStamp> {
        self.history.last().map(|(_, stamp)| *stamp)
    }

    /// The retention window.
    #[must_use]
    pub const fn max_history_duration(&self) -> Duration {
        self.max_history_duration
    }

    /// Update the retention window. Negative durations are ignored.
    pub fn set_max_history_duration(&mut self, max_history_duration: Duration) {
        if max_history_duration.is_negative() {
            error!(
                duration = max_history_duration.as_seconds(),
                "cannot set negative retention window, ignoring it"
            );
            return;
        }
        self.max_history_duration = max_history_duration;
    }
}

impl<T> Default for TemporalCache<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(value: f64) -> TimeStamp {
        TimeStamp::from_seconds(value)
    }

    /// Cache with entries 1@0s, 2@10s, 3@15s inside a 20s window.
    fn sample_cache() -> TemporalCache<i32> {
        let mut cache = TemporalCache::new(Duration::from_seconds(20.0));
        assert!(cache.insert(1, seconds(0.0)));
        assert!(cache.insert(2, seconds(10.0)));
        assert!(cache.insert(3, seconds(15.0)));
        cache
    }

    #[test]
    fn entries_are_strictly_descending() {
        let cache = sample_cache();
        let stamps: Vec<f64> = cache.iter().map(|(_, stamp)| stamp.as_seconds()).collect();
        assert_eq!(stamps, vec![15.0, 10.0, 0.0]);

        let ascending: Vec<i32> = cache.iter().rev().map(|(value, _)| *value).collect();
        assert_eq!(ascending, vec![1, 2, 3]);
    }

    #[test]
    fn closest_policy_with_tie_break_toward_newer() {
        let cache = sample_cache();

        assert_eq!(cache.get(seconds(0.0), AccessPolicy::Closest), Some(&1));
        assert_eq!(cache.get(seconds(4.0), AccessPolicy::Closest), Some(&1));
        // Equal distance to 0 and 10: the newer entry wins.
        assert_eq!(cache.get(seconds(5.0), AccessPolicy::Closest), Some(&2));
        assert_eq!(cache.get(seconds(10.0), AccessPolicy::Closest), Some(&2));
        assert_eq!(cache.get(seconds(12.0), AccessPolicy::Closest), Some(&2));
        // Equal distance to 10 and 15: the newer entry wins.
        assert_eq!(cache.get(seconds(12.5), AccessPolicy::Closest), Some(&3));
        assert_eq!(cache.get(seconds(15.0), AccessPolicy::Closest), Some(&3));
    }

    #[test]
    fn preceding_policy_never_returns_newer() {
        let cache = sample_cache();

        assert_eq!(cache.get(seconds(0.0), AccessPolicy::Preceding), Some(&1));
        assert_eq!(cache.get(seconds(5.0), AccessPolicy::Preceding), Some(&1));
        assert_eq!(cache.get(seconds(12.5), AccessPolicy::Preceding), Some(&2));
        assert_eq!(cache.get(seconds(15.0), AccessPolicy::Preceding), Some(&3));
    }

    #[test]
    fn queries_clamp_to_boundaries() {
        let cache = sample_cache();

        // Beyond the newest entry: still the latest entry.
        assert_eq!(cache.get(seconds(30.0), AccessPolicy::Closest), Some(&3));
        assert_eq!(cache.get(seconds(30.0), AccessPolicy::Preceding), Some(&3));
        // Before the oldest entry: still the oldest entry.
        assert_eq!(cache.get(seconds(-5.0), AccessPolicy::Closest), Some(&1));
        assert_eq!(cache.get(seconds(-5.0), AccessPolicy::Preceding), Some(&1));
    }

    #[test]
    fn empty_cache_signals_no_data() {
        let cache: TemporalCache<i32> = TemporalCache::default();

        assert!(cache.is_empty());
        assert_eq!(cache.get(seconds(1.0), AccessPolicy::Closest), None);
        assert_eq!(cache.latest_timestamp(), None);
        assert_eq!(cache.oldest_timestamp(), None);
    }

    #[test]
    fn duplicate_stamp_is_rejected_unchanged() {
        let mut cache = sample_cache();

        assert!(!cache.insert(99, seconds(10.0)));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(seconds(10.0), AccessPolicy::Preceding), Some(&2));
    }

    #[test]
    fn insertion_outside_window_is_rejected() {
        let mut cache = TemporalCache::new(Duration::from_seconds(5.0));
        assert!(cache.insert(1, seconds(100.0)));

        assert!(!cache.insert(0, seconds(94.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn window_eviction_after_insert() {
        let mut cache = TemporalCache::new(Duration::from_seconds(10.0));
        assert!(cache.insert(1, seconds(0.0)));
        assert!(cache.insert(2, seconds(5.0)));
        assert!(cache.insert(3, seconds(11.0)));

        // Entry at 0s is now older than 11s - 10s.
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.oldest_timestamp(), Some(seconds(5.0)));
    }

    #[test]
    fn out_of_order_insertion_lands_in_temporal_place() {
        let mut cache = TemporalCache::new(Duration::from_seconds(20.0));
        assert!(cache.insert(3, seconds(15.0)));
        assert!(cache.insert(1, seconds(0.0)));
        assert!(cache.insert(2, seconds(10.0)));

        let values: Vec<i32> = cache.iter().map(|(value, _)| *value).collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[test]
    fn external_delete_outdated_can_flush_completely() {
        let mut cache = sample_cache();
        cache.delete_outdated(seconds(100.0));

        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = sample_cache();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(seconds(0.0), AccessPolicy::Closest), None);
    }

    #[test]
    fn negative_window_is_ignored() {
        let mut cache: TemporalCache<i32> = TemporalCache::new(Duration::from_seconds(-1.0));
        assert_eq!(cache.max_history_duration(), TemporalCache::<i32>::DEFAULT_WINDOW);

        cache.set_max_history_duration(Duration::from_seconds(-2.0));
        assert_eq!(cache.max_history_duration(), TemporalCache::<i32>::DEFAULT_WINDOW);

        cache.set_max_history_duration(Duration::from_seconds(30.0));
        assert_eq!(cache.max_history_duration(), Duration::from_seconds(30.0));
    }
}

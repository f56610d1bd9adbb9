//! # Property-Based Tests
//!
//! Proptest invariants for the temporal cache and the scene graph:
//! ordering, eviction, query policies and pose composition hold for
//! arbitrary inputs, not just the handpicked cases.

use glam::DVec3;
use proptest::collection::vec;
use proptest::prelude::*;
use rsgraph_core::{
    AccessPolicy, Attribute, Duration, Scene, TemporalCache, TimeStamp, attributes_match,
    pose::translation_of, pose_from_translation,
};

/// Stamps drawn from a small grid so duplicates actually occur.
fn stamp_grid() -> impl Strategy<Value = f64> {
    (0i64..200).prop_map(|ticks| ticks as f64 * 0.5)
}

proptest! {
    /// History stays strictly descending regardless of insertion order,
    /// and every accepted entry is unique by stamp.
    #[test]
    fn cache_history_is_strictly_descending(stamps in vec(stamp_grid(), 1..60)) {
        let mut cache = TemporalCache::new(Duration::from_seconds(1_000.0));
        for (value, stamp) in stamps.iter().enumerate() {
            cache.insert(value, TimeStamp::from_seconds(*stamp));
        }

        let stored: Vec<f64> = cache
            .iter()
            .map(|(_, stamp)| stamp.as_seconds())
            .collect();
        for window in stored.windows(2) {
            prop_assert!(window[0] > window[1]);
        }
    }

    /// A duplicate stamp never displaces the first-inserted value.
    #[test]
    fn cache_rejects_duplicate_stamps(stamp in stamp_grid()) {
        let mut cache = TemporalCache::new(Duration::from_seconds(1_000.0));
        let at = TimeStamp::from_seconds(stamp);

        prop_assert!(cache.insert("first", at));
        prop_assert!(!cache.insert("second", at));
        prop_assert_eq!(cache.len(), 1);
        prop_assert_eq!(cache.get(at, AccessPolicy::Closest), Some(&"first"));
    }

    /// After any insertion sequence, every retained entry lies within
    /// the retention window of the newest one.
    #[test]
    fn cache_eviction_respects_the_window(
        stamps in vec(stamp_grid(), 1..60),
        window_seconds in 1.0f64..30.0,
    ) {
        let window = Duration::from_seconds(window_seconds);
        let mut cache = TemporalCache::new(window);
        for (value, stamp) in stamps.iter().enumerate() {
            cache.insert(value, TimeStamp::from_seconds(*stamp));
        }

        let newest = cache.latest_timestamp().expect("non-empty");
        for (_, stamp) in cache.iter() {
            prop_assert!(stamp + window >= newest);
        }
    }

    /// The closest policy agrees with a naive minimum-distance scan,
    /// resolving ties toward the newer entry.
    #[test]
    fn closest_policy_matches_naive_scan(
        stamps in vec(stamp_grid(), 1..40),
        query in stamp_grid(),
    ) {
        let mut cache = TemporalCache::new(Duration::from_seconds(1_000.0));
        for (value, stamp) in stamps.iter().enumerate() {
            cache.insert(value, TimeStamp::from_seconds(*stamp));
        }
        let at = TimeStamp::from_seconds(query);

        // Newest-first scan; strict `<` keeps the newer entry on ties.
        let expected = cache
            .iter()
            .min_by(|(_, left), (_, right)| {
                let left_distance = (at - *left).abs();
                let right_distance = (at - *right).abs();
                left_distance
                    .partial_cmp(&right_distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(value, _)| value);
        prop_assert_eq!(cache.get(at, AccessPolicy::Closest), expected);
    }

    /// The preceding policy returns the newest entry at or before the
    /// query, clamping to the oldest entry for too-early queries.
    #[test]
    fn preceding_policy_never_returns_later_data(
        stamps in vec(stamp_grid(), 1..40),
        query in stamp_grid(),
    ) {
        let mut cache = TemporalCache::new(Duration::from_seconds(1_000.0));
        for (value, stamp) in stamps.iter().enumerate() {
            cache.insert(value, TimeStamp::from_seconds(*stamp));
        }
        let at = TimeStamp::from_seconds(query);

        let expected = cache
            .iter()
            .find(|(_, stamp)| *stamp <= at)
            .or_else(|| cache.iter().next_back())
            .map(|(value, _)| value);
        prop_assert_eq!(cache.get(at, AccessPolicy::Preceding), expected);
    }

    /// Conjunctive matching is monotone: shrinking the query never
    /// loses a match, growing it with a missing attribute always does.
    #[test]
    fn attribute_match_is_conjunctive(
        keys in vec("[a-d]", 0..6),
        values in vec("[x-z]", 0..6),
    ) {
        let candidate: Vec<Attribute> = keys
            .iter()
            .zip(values.iter())
            .map(|(key, value)| Attribute::new(key.clone(), value.clone()))
            .collect();

        prop_assert!(attributes_match(&candidate, &[]));
        for attribute in &candidate {
            prop_assert!(attributes_match(&candidate, std::slice::from_ref(attribute)));
        }
        let mut query = candidate.clone();
        query.push(Attribute::new("missing", "missing"));
        prop_assert!(!attributes_match(&candidate, &query));
    }

    /// Composing a chain of pure translations accumulates the exact
    /// component-wise sum.
    #[test]
    fn translation_chain_composes_to_the_sum(
        offsets in vec((-100i32..100, -100i32..100, -100i32..100), 1..8)
    ) {
        let mut scene = Scene::new();
        let stamp = TimeStamp::from_seconds(1.0);
        let mut parent = scene.root_id();
        let mut expected = DVec3::ZERO;

        for (x, y, z) in &offsets {
            let offset = DVec3::new(f64::from(*x), f64::from(*y), f64::from(*z));
            expected += offset;
            parent = scene
                .add_transform_node(parent, Vec::new(), pose_from_translation(offset), stamp)
                .expect("add transform");
        }

        let global = scene.get_transform_for_node(parent, stamp).expect("global");
        prop_assert_eq!(translation_of(&global), expected);
    }
}

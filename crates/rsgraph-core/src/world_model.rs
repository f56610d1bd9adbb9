//! # World Model
//!
//! The top-level handle: one scene plus the clock that stamps its
//! updates.
//!
//! The clock samples wall time but never runs backwards: successive
//! [`WorldModel::now`] calls are monotonic non-decreasing even when
//! the system clock is adjusted, so freshly sampled stamps are always
//! accepted by stale-update checks.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::scene::Scene;
use crate::time::TimeStamp;
use crate::types::Id;

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock source clamped to be monotonic non-decreasing.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_seconds: f64,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current time, never earlier than a previously returned value.
    pub fn now(&mut self) -> TimeStamp {
        let sampled = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(self.last_seconds);
        if sampled > self.last_seconds {
            self.last_seconds = sampled;
        }
        TimeStamp::from_seconds(self.last_seconds)
    }
}

// =============================================================================
// WORLD MODEL
// =============================================================================

/// A scene graph plus its time source.
#[derive(Default)]
pub struct WorldModel {
    /// The scene facade; all graph access goes through it.
    pub scene: Scene,
    clock: MonotonicClock,
}

impl WorldModel {
    /// Create a world model with a fresh root and clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            clock: MonotonicClock::new(),
        }
    }

    /// The root group's id.
    #[must_use]
    pub fn root_id(&self) -> Id {
        self.scene.root_id()
    }

    /// A fresh update stamp from the model's clock.
    pub fn now(&mut self) -> TimeStamp {
        self.clock.now()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic_non_decreasing() {
        let mut model = WorldModel::new();
        let mut previous = model.now();
        for _ in 0..1000 {
            let current = model.now();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn fresh_model_has_only_the_root() {
        let model = WorldModel::new();
        assert_eq!(model.scene.node_count(), 1);
        assert!(!model.root_id().is_nil());
    }
}

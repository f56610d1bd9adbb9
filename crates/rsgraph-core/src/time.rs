//! # Time Primitives
//!
//! Time stamps and durations for all temporal operations.
//!
//! A [`TimeStamp`] is a real-valued instant in seconds. Stamps sourced
//! from a world model clock are monotonic non-decreasing: ties are
//! permitted but `>=` always holds for successively sampled stamps.
//!
//! Arithmetic follows the usual affine conventions:
//! - `TimeStamp - TimeStamp = Duration`
//! - `TimeStamp ± Duration = TimeStamp`

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

// =============================================================================
// TIMESTAMP
// =============================================================================

/// An instant in time, stored as seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct TimeStamp(f64);

impl TimeStamp {
    /// The zero instant.
    pub const ZERO: Self = Self(0.0);

    /// Create a time stamp from seconds.
    #[must_use]
    pub const fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Create a time stamp from milliseconds.
    #[must_use]
    pub const fn from_milliseconds(milliseconds: f64) -> Self {
        Self(milliseconds / 1000.0)
    }

    /// Create a time stamp from microseconds.
    #[must_use]
    pub const fn from_microseconds(microseconds: f64) -> Self {
        Self(microseconds / 1_000_000.0)
    }

    /// The stamp value in seconds.
    #[must_use]
    pub const fn as_seconds(self) -> f64 {
        self.0
    }
}

impl Sub for TimeStamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        Duration::from_seconds(self.0 - rhs.0)
    }
}

impl Add<Duration> for TimeStamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_seconds())
    }
}

impl Sub<Duration> for TimeStamp {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self {
        Self(self.0 - rhs.as_seconds())
    }
}

// =============================================================================
// DURATION
// =============================================================================

/// A signed span of time, stored as seconds.
///
/// Durations may be negative as the result of stamp subtraction;
/// consumers that require a window size (e.g. the temporal cache)
/// reject negative values explicitly.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Duration(f64);

impl Duration {
    /// The empty span.
    pub const ZERO: Self = Self(0.0);

    /// Create a duration from seconds.
    #[must_use]
    pub const fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Create a duration from milliseconds.
    #[must_use]
    pub const fn from_milliseconds(milliseconds: f64) -> Self {
        Self(milliseconds / 1000.0)
    }

    /// The span in seconds.
    #[must_use]
    pub const fn as_seconds(self) -> f64 {
        self.0
    }

    /// Absolute value of the span, used for temporal distance comparisons.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Whether the span is negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < 0.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

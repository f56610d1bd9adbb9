//! # Homogeneous Transforms
//!
//! Pose representation for transform nodes.
//!
//! A pose is a homogeneous 4x4 matrix ([`glam::DMat4`], column-major):
//! a 3x3 rotation block, a 3x1 translation column and a bottom row
//! fixed to `[0, 0, 0, 1]`. Poses compose by matrix multiplication
//! along a graph path (root first).

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

/// A homogeneous 4x4 pose matrix, column-major.
pub type Pose = DMat4;

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Build a pose from a 3x3 rotation block and a translation vector.
#[must_use]
pub fn pose_from_parts(rotation: DMat3, translation: DVec3) -> Pose {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

/// Build a pure-translation pose (identity rotation).
#[must_use]
pub fn pose_from_translation(translation: DVec3) -> Pose {
    DMat4::from_translation(translation)
}

/// The translation column of a pose.
#[must_use]
pub fn translation_of(pose: &Pose) -> DVec3 {
    pose.w_axis.truncate()
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check that a matrix is a well-formed homogeneous transform:
/// all entries finite and the bottom row exactly `[0, 0, 0, 1]`.
#[must_use]
pub fn is_valid_pose(pose: &Pose) -> bool {
    let finite = pose.to_cols_array().iter().all(|entry| entry.is_finite());
    let bottom_row = pose.x_axis.w == 0.0
        && pose.y_axis.w == 0.0
        && pose.z_axis.w == 0.0
        && pose.w_axis.w == 1.0;
    finite && bottom_row
}

// =============================================================================
// POSE COVARIANCE
// =============================================================================

/// A 6x6 covariance over the pose degrees of freedom
/// (x, y, z, roll, pitch, yaw), attached to uncertain transforms.
///
/// The matrix content is carried opaquely; the core never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariance6 {
    /// Row-major covariance entries.
    pub matrix: [[f64; 6]; 6],
}

impl Covariance6 {
    /// The all-zero covariance (fully certain).
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            matrix: [[0.0; 6]; 6],
        }
    }

    /// A diagonal covariance from per-axis variances.
    #[must_use]
    pub fn from_diagonal(variances: [f64; 6]) -> Self {
        let mut covariance = Self::zero();
        for (index, variance) in variances.iter().enumerate() {
            covariance.matrix[index][index] = *variance;
        }
        covariance
    }

    /// Check that all entries are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.matrix
            .iter()
            .all(|row| row.iter().all(|entry| entry.is_finite()))
    }
}

impl Default for Covariance6 {
    fn default() -> Self {
        Self::zero()
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Core Type Definitions
//!
//! This module contains the foundation types for the rsgraph scene-graph
//! world model:
//! - Graph-wide unique identifiers ([`Id`], [`IdGenerator`])
//! - Node annotations ([`Attribute`]) and conjunctive matching
//! - Opaque geometry payloads ([`Shape`])
//! - Error types ([`SceneGraphError`])
//!
//! ## Identity Guarantees
//!
//! Ids are unique within one world model instance and carry an instance
//! scope in their high bits, so ids imported from a remote world model
//! (see `Scene::add_remote_root_node`) never collide with locally
//! generated ones and are never renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::time::TimeStamp;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a node, group, transform or connection.
///
/// Opaque, totally ordered (usable as a map key). The distinguished
/// [`Id::NIL`] value marks "no node".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Id(pub u128);

impl Id {
    /// The invalid/nil identifier. Never assigned to a node.
    pub const NIL: Self = Self(0);

    /// Whether this id is the nil value.
    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = (self.0 >> 64) as u64;
        let serial = self.0 as u64;
        write!(f, "{instance:x}:{serial:x}")
    }
}

/// Pick a process-unique instance tag for a new id generator.
///
/// Combines wall-clock nanoseconds, the process id and a process-wide
/// counter; the trailing `| 1` keeps the tag nonzero so generated ids
/// can never equal [`Id::NIL`].
fn next_instance_tag() -> u64 {
    static INSTANCES: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0);
    let ordinal = INSTANCES.fetch_add(1, Ordering::Relaxed);

    (nanos ^ (u64::from(std::process::id()) << 32) ^ (ordinal << 1)) | 1
}

/// Generator of graph-wide unique identifiers.
///
/// The high 64 bits of every produced id are the generator's instance
/// tag, the low 64 bits a monotonically increasing serial. Ids from
/// different world model instances therefore occupy disjoint ranges,
/// which is what makes remote-root imports safe without renumbering.
#[derive(Debug)]
pub struct IdGenerator {
    instance: u64,
    serial: u64,
}

impl IdGenerator {
    /// Create a generator with a fresh instance scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance: next_instance_tag(),
            serial: 0,
        }
    }

    /// Produce the next unique id.
    pub fn generate(&mut self) -> Id {
        self.serial = self.serial.saturating_add(1);
        Id((u128::from(self.instance) << 64) | u128::from(self.serial))
    }

    /// The instance scope of this generator.
    #[must_use]
    pub const fn instance(&self) -> u64 {
        self.instance
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ATTRIBUTES
// =============================================================================

/// A (key, value) string annotation on a node or connection.
///
/// Equality is exact string match on both fields. A node may carry
/// duplicate keys; consumers filter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// The relationship or tag name, e.g. `"name"` or `"taskType"`.
    pub key: String,
    /// The associated value.
    pub value: String,
}

impl Attribute {
    /// Create a new attribute pair.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Conjunctive (AND) attribute match: every query attribute must be
/// present in the candidate set. An empty query matches everything.
#[must_use]
pub fn attributes_match(candidate: &[Attribute], query: &[Attribute]) -> bool {
    query.iter().all(|wanted| candidate.contains(wanted))
}

// =============================================================================
// SHAPES
// =============================================================================

/// Geometry payload of a geometric node.
///
/// Shapes are consumed opaquely: the core stores and replicates them
/// but never interprets the geometry itself. Dimension validation
/// happens once, at the scene facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned box given by its extents.
    Box {
        width: f64,
        height: f64,
        depth: f64,
    },
    /// Sphere given by its radius.
    Sphere { radius: f64 },
    /// Cylinder along the local z axis.
    Cylinder { radius: f64, height: f64 },
    /// Indexed triangle mesh.
    Mesh {
        vertices: Vec<[f64; 3]>,
        triangles: Vec<[u32; 3]>,
    },
    /// Reference to an externally held point cloud container.
    PointCloudRef { cloud_id: u64 },
}

impl Shape {
    /// Check that the shape's dimensions are well formed
    /// (finite, positive extents; triangle indices in bounds).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        fn positive(value: f64) -> bool {
            value.is_finite() && value > 0.0
        }

        match self {
            Self::Box {
                width,
                height,
                depth,
            } => positive(*width) && positive(*height) && positive(*depth),
            Self::Sphere { radius } => positive(*radius),
            Self::Cylinder { radius, height } => positive(*radius) && positive(*height),
            Self::Mesh {
                vertices,
                triangles,
            } => {
                let finite = vertices
                    .iter()
                    .all(|vertex| vertex.iter().all(|coordinate| coordinate.is_finite()));
                let in_bounds = triangles.iter().all(|triangle| {
                    triangle
                        .iter()
                        .all(|index| (*index as usize) < vertices.len())
                });
                finite && in_bounds
            }
            Self::PointCloudRef { .. } => true,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors reported by scene-graph operations.
///
/// All mutating operations report failure through `Result`; the core
/// never panics and performs no automatic retry. Observers are still
/// notified of rejected updates unless configured otherwise.
#[derive(Debug, Error)]
pub enum SceneGraphError {
    /// The referenced id is absent from the graph.
    #[error("node not found: {0}")]
    NodeNotFound(Id),

    /// A forced id collides with an existing node.
    #[error("id already in use: {0}")]
    IdAlreadyInUse(Id),

    /// The referenced node cannot hold children.
    #[error("node {0} is not a group")]
    NotAGroup(Id),

    /// The referenced node is not a transform.
    #[error("node {0} is not a transform")]
    NotATransform(Id),

    /// The referenced node is not a connection.
    #[error("node {0} is not a connection")]
    NotAConnection(Id),

    /// An entry with this time stamp already exists in the cache.
    #[error("duplicate time stamp at {0:?}")]
    DuplicateTimeStamp(TimeStamp),

    /// The update's time stamp precedes the last recorded one.
    #[error("stale update: stamp {attempted:?} is older than last update {last:?}")]
    StaleUpdate {
        attempted: TimeStamp,
        last: TimeStamp,
    },

    /// The time stamp falls outside the cache's retention window.
    #[error("cache limit violated for stamp {0:?}")]
    CacheLimitViolated(TimeStamp),

    /// The matrix is not a well-formed homogeneous transform.
    #[error("invalid transform matrix")]
    InvalidTransform,

    /// The shape's dimensions are malformed.
    #[error("invalid shape dimensions")]
    InvalidShape,

    /// The requested parent link would make a node its own ancestor.
    #[error("cycle detected: {0} would become its own ancestor")]
    CycleDetected(Id),

    /// The root node cannot be deleted.
    #[error("the root node cannot be deleted")]
    CannotDeleteRoot,

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred (archive, ports).
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

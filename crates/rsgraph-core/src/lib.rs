//! # rsgraph-core
//!
//! A temporal scene-graph world model - THE WORLD STATE.
//!
//! This crate implements the shared world model substrate for robotic
//! applications: a directed acyclic graph of groups, transforms,
//! geometric nodes and connections, where every pose and attribute
//! update carries a time stamp and recent history stays queryable.
//!
//! ## Architecture
//!
//! - `scene` is the only mutation entry point; it validates, applies,
//!   then notifies attached observers synchronously
//! - transform data lives in per-node temporal caches with a sliding
//!   retention window; queries resolve by time stamp
//! - observers drive distribution: the update serializer replays every
//!   successful mutation, as JSON, into a replica world model
//!
//! ## Architectural Constraints
//!
//! - The core is synchronous: no async, no network dependencies;
//!   transports plug in through the `formats::ports` traits
//! - Geometry payloads are opaque: stored, replicated, never computed on
//! - All container iteration is deterministic (`BTreeMap`-backed arena)

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod formats;
pub mod graph;
pub mod observer;
pub mod pose;
pub mod scene;
pub mod storage;
pub mod time;
pub mod traversal;
pub mod types;
pub mod world_model;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Attribute, Id, IdGenerator, SceneGraphError, Shape, attributes_match};

// =============================================================================
// RE-EXPORTS: Time and Temporal Cache
// =============================================================================

pub use cache::{AccessPolicy, TemporalCache};
pub use time::{Duration, TimeStamp};

// =============================================================================
// RE-EXPORTS: Scene Graph
// =============================================================================

pub use graph::{NodeKind, SceneGraph, SceneNode};
pub use observer::{UpdateObserver, UpdateRecorder};
pub use pose::{Covariance6, Pose, is_valid_pose, pose_from_parts, pose_from_translation};
pub use scene::{ObserverHandle, Scene};
pub use traversal::{
    AttributeFinder, Direction, DotGraphGenerator, IdCollector, NodeVisitor, PathCollector,
    global_transform, transform_along_path, traverse,
};
pub use world_model::{MonotonicClock, WorldModel};

// =============================================================================
// RE-EXPORTS: Formats and Storage
// =============================================================================

pub use formats::{
    InputPort, LoopbackBridge, OutputPort, SceneUpdate, SnapshotHeader, UpdateDeserializer,
    UpdateSerializer, graph_from_bytes, graph_to_bytes,
};
pub use storage::archive::UpdateArchive;

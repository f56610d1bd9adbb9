//! # Snapshot Persistence
//!
//! Binary whole-graph snapshots.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic (`"RSGW"`)
//! - 1 byte: Version
//!
//! A snapshot captures the arena verbatim: node kinds, attribute sets
//! with their update stamps, full transform histories (retention
//! windows included) and the shared-child edge structure. Restoring a
//! snapshot rebuilds an equivalent graph; ids are preserved.
//!
//! Payload size and header are validated before deserialization, so a
//! corrupted or hostile snapshot fails fast instead of allocating.

use serde::{Deserialize, Serialize};

use crate::cache::TemporalCache;
use crate::graph::{NodeKind, SceneGraph, SceneNode};
use crate::pose::{Covariance6, Pose};
use crate::time::{Duration, TimeStamp};
use crate::types::{Attribute, Id, SceneGraphError, Shape};

/// Magic bytes identifying a snapshot file.
pub const MAGIC_BYTES: &[u8; 4] = b"RSGW";

/// Current snapshot format version.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size, validated before deserialization.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Minimum valid snapshot size (header only).
const MIN_SNAPSHOT_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all graph data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), SceneGraphError> {
        if &self.magic != MAGIC_BYTES {
            return Err(SceneGraphError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(SceneGraphError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SceneGraphError> {
        if bytes.len() < MIN_SNAPSHOT_SIZE {
            return Err(SceneGraphError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT PAYLOAD
// =============================================================================

/// Serializable image of one node's kind-specific state.
///
/// Transform histories are stored oldest-first so restoration can
/// replay them through the cache's ordinary insertion path.
#[derive(Debug, Serialize, Deserialize)]
enum KindRecord {
    Leaf,
    Group {
        children: Vec<Id>,
    },
    Transform {
        children: Vec<Id>,
        window: Duration,
        poses: Vec<(Pose, TimeStamp)>,
        covariances: Option<Vec<(Covariance6, TimeStamp)>>,
    },
    Geometric {
        shape: Shape,
        stamp: TimeStamp,
    },
    Connection {
        sources: Vec<Id>,
        targets: Vec<Id>,
        start: TimeStamp,
        end: TimeStamp,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: Id,
    attributes: Vec<Attribute>,
    attributes_stamp: TimeStamp,
    kind: KindRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphSnapshot {
    root: Id,
    remote_roots: Vec<Id>,
    nodes: Vec<NodeRecord>,
}

fn record_node(node: &SceneNode) -> NodeRecord {
    let kind = match &node.kind {
        NodeKind::Leaf => KindRecord::Leaf,
        NodeKind::Group { children } => KindRecord::Group {
            children: children.clone(),
        },
        NodeKind::Transform {
            children,
            history,
            covariance,
        } => KindRecord::Transform {
            children: children.clone(),
            window: history.max_history_duration(),
            poses: history
                .iter()
                .rev()
                .map(|(pose, stamp)| (*pose, stamp))
                .collect(),
            covariances: covariance.as_ref().map(|cache| {
                cache
                    .iter()
                    .rev()
                    .map(|(value, stamp)| (*value, stamp))
                    .collect()
            }),
        },
        NodeKind::Geometric { shape, stamp } => KindRecord::Geometric {
            shape: shape.clone(),
            stamp: *stamp,
        },
        NodeKind::Connection {
            sources,
            targets,
            start,
            end,
        } => KindRecord::Connection {
            sources: sources.clone(),
            targets: targets.clone(),
            start: *start,
            end: *end,
        },
    };
    NodeRecord {
        id: node.id,
        attributes: node.attributes.clone(),
        attributes_stamp: node.attributes_stamp,
        kind,
    }
}

/// Rebuild the kind and report the record's child edges separately.
fn restore_kind(kind: KindRecord) -> (NodeKind, Vec<Id>) {
    match kind {
        KindRecord::Leaf => (NodeKind::Leaf, Vec::new()),
        KindRecord::Group { children } => (NodeKind::Group { children: Vec::new() }, children),
        KindRecord::Transform {
            children,
            window,
            poses,
            covariances,
        } => {
            let mut history = TemporalCache::new(window);
            for (pose, stamp) in poses {
                history.insert(pose, stamp);
            }
            let covariance = covariances.map(|entries| {
                let mut cache = TemporalCache::new(window);
                for (value, stamp) in entries {
                    cache.insert(value, stamp);
                }
                cache
            });
            (
                NodeKind::Transform {
                    children: Vec::new(),
                    history,
                    covariance,
                },
                children,
            )
        }
        KindRecord::Geometric { shape, stamp } => (NodeKind::Geometric { shape, stamp }, Vec::new()),
        KindRecord::Connection {
            sources,
            targets,
            start,
            end,
        } => (
            NodeKind::Connection {
                sources,
                targets,
                start,
                end,
            },
            Vec::new(),
        ),
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn graph_to_bytes(graph: &SceneGraph) -> Result<Vec<u8>, SceneGraphError> {
    let snapshot = GraphSnapshot {
        root: graph.root(),
        remote_roots: graph.remote_roots().collect(),
        nodes: graph.nodes().map(record_node).collect(),
    };

    let payload = postcard::to_stdvec(&snapshot)
        .map_err(|e| SceneGraphError::SerializationError(e.to_string()))?;
    if payload.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(SceneGraphError::SerializationError(format!(
            "Snapshot payload too large: {} bytes",
            payload.len()
        )));
    }

    let mut bytes = Vec::with_capacity(MIN_SNAPSHOT_SIZE + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a graph from bytes, validating header and size first.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<SceneGraph, SceneGraphError> {
    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_SNAPSHOT_SIZE..];
    if payload.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(SceneGraphError::SerializationError(format!(
            "Snapshot payload too large: {} bytes",
            payload.len()
        )));
    }

    let snapshot: GraphSnapshot = postcard::from_bytes(payload)
        .map_err(|e| SceneGraphError::SerializationError(e.to_string()))?;
    restore_graph(snapshot)
}

fn restore_graph(snapshot: GraphSnapshot) -> Result<SceneGraph, SceneGraphError> {
    let root_record = snapshot
        .nodes
        .iter()
        .find(|record| record.id == snapshot.root)
        .ok_or_else(|| {
            SceneGraphError::SerializationError("Snapshot lacks its root node".to_string())
        })?;
    let mut graph = SceneGraph::new(snapshot.root, root_record.attributes.clone());

    // First pass: materialize every node, edges deferred.
    let mut edges: Vec<(Id, Vec<Id>)> = Vec::new();
    for record in snapshot.nodes {
        let id = record.id;
        let (kind, children) = restore_kind(record.kind);
        if !children.is_empty() {
            edges.push((id, children));
        }
        if id == snapshot.root {
            if let Some(root_node) = graph.node_mut(id) {
                root_node.attributes_stamp = record.attributes_stamp;
                root_node.kind = kind;
            }
            continue;
        }
        let mut node = SceneNode::new(id, record.attributes, kind);
        node.attributes_stamp = record.attributes_stamp;
        if snapshot.remote_roots.contains(&id) {
            graph.insert_remote_root(node)?;
        } else {
            graph.insert_node(node)?;
        }
    }

    // Second pass: re-link children in their recorded order.
    for (parent, children) in edges {
        for child in children {
            graph.add_child(parent, child)?;
        }
    }
    Ok(graph)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AccessPolicy;
    use crate::pose::pose_from_translation;
    use glam::DVec3;

    fn sample_graph() -> SceneGraph {
        let stamp = TimeStamp::from_seconds(1.0);
        let mut graph = SceneGraph::new(Id(1), vec![Attribute::new("name", "root")]);

        let mut history = TemporalCache::new(Duration::from_seconds(20.0));
        history.insert(pose_from_translation(DVec3::new(1.0, 2.0, 3.0)), stamp);
        history.insert(
            pose_from_translation(DVec3::new(4.0, 5.0, 6.0)),
            TimeStamp::from_seconds(2.0),
        );
        graph
            .insert_node(SceneNode::new(
                Id(2),
                vec![Attribute::new("name", "tf")],
                NodeKind::Transform {
                    children: Vec::new(),
                    history,
                    covariance: None,
                },
            ))
            .expect("insert");
        graph
            .insert_node(SceneNode::new(
                Id(3),
                Vec::new(),
                NodeKind::Geometric {
                    shape: Shape::Sphere { radius: 0.25 },
                    stamp,
                },
            ))
            .expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");
        graph.add_child(Id(2), Id(3)).expect("add");
        graph
    }

    #[test]
    fn snapshot_roundtrip_preserves_structure_and_history() {
        let graph = sample_graph();
        let bytes = graph_to_bytes(&graph).expect("serialize");
        let restored = graph_from_bytes(&bytes).expect("deserialize");

        assert_eq!(restored.root(), graph.root());
        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(
            restored.node(Id(2)).expect("node").attributes,
            vec![Attribute::new("name", "tf")]
        );
        assert_eq!(restored.node(Id(2)).expect("node").parent(0), Some(Id(1)));

        // Full history survives, both entries queryable.
        let early = restored
            .transform_at(Id(2), TimeStamp::from_seconds(1.0), AccessPolicy::Closest)
            .expect("query")
            .expect("pose");
        assert_eq!(early, pose_from_translation(DVec3::new(1.0, 2.0, 3.0)));
        let late = restored
            .transform_at(Id(2), TimeStamp::from_seconds(2.0), AccessPolicy::Closest)
            .expect("query")
            .expect("pose");
        assert_eq!(late, pose_from_translation(DVec3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn header_validation_rejects_corruption() {
        let graph = sample_graph();
        let mut bytes = graph_to_bytes(&graph).expect("serialize");

        bytes[0] = b'X';
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(SceneGraphError::SerializationError(_))
        ));

        bytes[0] = MAGIC_BYTES[0];
        bytes[4] = FORMAT_VERSION + 1;
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(SceneGraphError::SerializationError(_))
        ));
    }

    #[test]
    fn truncated_input_fails_fast() {
        assert!(matches!(
            graph_from_bytes(b"RS"),
            Err(SceneGraphError::SerializationError(_))
        ));
    }

    #[test]
    fn remote_roots_survive_roundtrip() {
        let mut graph = sample_graph();
        graph
            .insert_remote_root(SceneNode::new(
                Id(0xbeef),
                Vec::new(),
                NodeKind::Group { children: Vec::new() },
            ))
            .expect("insert remote root");

        let bytes = graph_to_bytes(&graph).expect("serialize");
        let restored = graph_from_bytes(&bytes).expect("deserialize");
        assert!(restored.is_remote_root(Id(0xbeef)));
    }
}

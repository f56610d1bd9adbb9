//! # Update Wire Format
//!
//! JSON encoding of scene mutations for distribution.
//!
//! Each mutating operation maps to one [`SceneUpdate`] variant carrying
//! the operation's full parameter set, ids included. The
//! [`UpdateSerializer`] is an observer that encodes every *successful*
//! update and writes it to an output port (rejected updates stay
//! local); the [`UpdateDeserializer`] is an input port that applies
//! decoded updates to a replica world model, preserving the origin's
//! ids via the `*_with_id` operations.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::formats::ports::{InputPort, OutputPort};
use crate::observer::UpdateObserver;
use crate::pose::{Covariance6, Pose};
use crate::storage::archive::UpdateArchive;
use crate::time::TimeStamp;
use crate::types::{Attribute, Id, SceneGraphError, Shape};
use crate::world_model::WorldModel;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// One scene mutation, self-contained and replayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneUpdate {
    AddNode {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
    },
    AddGroup {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
    },
    AddTransformNode {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        stamp: TimeStamp,
    },
    AddUncertainTransformNode {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        covariance: Covariance6,
        stamp: TimeStamp,
    },
    AddGeometricNode {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        shape: Shape,
        stamp: TimeStamp,
    },
    AddRemoteRootNode {
        id: Id,
        attributes: Vec<Attribute>,
    },
    AddConnection {
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        sources: Vec<Id>,
        targets: Vec<Id>,
        start: TimeStamp,
        end: TimeStamp,
    },
    SetNodeAttributes {
        id: Id,
        attributes: Vec<Attribute>,
        stamp: TimeStamp,
    },
    SetTransform {
        id: Id,
        pose: Pose,
        stamp: TimeStamp,
    },
    SetUncertainTransform {
        id: Id,
        pose: Pose,
        covariance: Covariance6,
        stamp: TimeStamp,
    },
    AddParent {
        id: Id,
        parent: Id,
    },
    RemoveParent {
        id: Id,
        parent: Id,
    },
    DeleteNode {
        id: Id,
    },
}

// =============================================================================
// SERIALIZER (ORIGIN SIDE)
// =============================================================================

/// Observer that encodes successful updates as JSON and writes each to
/// an output port, optionally archiving the raw payload.
///
/// Rejected updates are not forwarded: a replica replays effects, not
/// attempts. Encoding or transport failures are logged and skipped so
/// a broken link never fails the local mutation that triggered it.
pub struct UpdateSerializer {
    port: Box<dyn OutputPort>,
    archive: Option<UpdateArchive>,
    sequence: u64,
}

impl UpdateSerializer {
    #[must_use]
    pub fn new(port: Box<dyn OutputPort>) -> Self {
        Self {
            port,
            archive: None,
            sequence: 0,
        }
    }

    /// Also archive every forwarded payload, keyed by sequence number.
    #[must_use]
    pub fn with_archive(mut self, archive: UpdateArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Number of updates forwarded so far.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Announce the origin's root to the replica side. The replica
    /// imports it as a remote root, so all subsequent updates that
    /// reference the origin root resolve.
    pub fn advertise_root_node(&mut self, id: Id, attributes: &[Attribute]) {
        self.emit(&SceneUpdate::AddRemoteRootNode {
            id,
            attributes: attributes.to_vec(),
        });
    }

    fn emit(&mut self, update: &SceneUpdate) {
        let payload = match serde_json::to_vec(update) {
            Ok(payload) => payload,
            Err(source) => {
                error!(error = %source, "dropping unencodable scene update");
                return;
            }
        };
        if let Some(archive) = &self.archive {
            if let Err(source) = archive.store(self.sequence, &payload) {
                error!(error = %source, sequence = self.sequence, "update not archived");
            }
        }
        self.sequence += 1;
        if let Err(source) = self.port.write(&payload) {
            error!(error = %source, "update not delivered to output port");
        }
    }
}

impl UpdateObserver for UpdateSerializer {
    fn on_add_node(&mut self, parent: Id, id: Id, attributes: &[Attribute], success: bool) {
        if success {
            self.emit(&SceneUpdate::AddNode {
                parent,
                id,
                attributes: attributes.to_vec(),
            });
        }
    }

    fn on_add_group(&mut self, parent: Id, id: Id, attributes: &[Attribute], success: bool) {
        if success {
            self.emit(&SceneUpdate::AddGroup {
                parent,
                id,
                attributes: attributes.to_vec(),
            });
        }
    }

    fn on_add_transform_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        pose: &Pose,
        stamp: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::AddTransformNode {
                parent,
                id,
                attributes: attributes.to_vec(),
                pose: *pose,
                stamp,
            });
        }
    }

    fn on_add_uncertain_transform_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        pose: &Pose,
        covariance: &Covariance6,
        stamp: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::AddUncertainTransformNode {
                parent,
                id,
                attributes: attributes.to_vec(),
                pose: *pose,
                covariance: *covariance,
                stamp,
            });
        }
    }

    fn on_add_geometric_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        shape: &Shape,
        stamp: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::AddGeometricNode {
                parent,
                id,
                attributes: attributes.to_vec(),
                shape: shape.clone(),
                stamp,
            });
        }
    }

    fn on_add_remote_root_node(&mut self, id: Id, attributes: &[Attribute], success: bool) {
        if success {
            self.emit(&SceneUpdate::AddRemoteRootNode {
                id,
                attributes: attributes.to_vec(),
            });
        }
    }

    fn on_add_connection(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        sources: &[Id],
        targets: &[Id],
        start: TimeStamp,
        end: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::AddConnection {
                parent,
                id,
                attributes: attributes.to_vec(),
                sources: sources.to_vec(),
                targets: targets.to_vec(),
                start,
                end,
            });
        }
    }

    fn on_set_node_attributes(
        &mut self,
        id: Id,
        attributes: &[Attribute],
        stamp: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::SetNodeAttributes {
                id,
                attributes: attributes.to_vec(),
                stamp,
            });
        }
    }

    fn on_set_transform(&mut self, id: Id, pose: &Pose, stamp: TimeStamp, success: bool) {
        if success {
            self.emit(&SceneUpdate::SetTransform {
                id,
                pose: *pose,
                stamp,
            });
        }
    }

    fn on_set_uncertain_transform(
        &mut self,
        id: Id,
        pose: &Pose,
        covariance: &Covariance6,
        stamp: TimeStamp,
        success: bool,
    ) {
        if success {
            self.emit(&SceneUpdate::SetUncertainTransform {
                id,
                pose: *pose,
                covariance: *covariance,
                stamp,
            });
        }
    }

    fn on_add_parent(&mut self, id: Id, parent: Id, success: bool) {
        if success {
            self.emit(&SceneUpdate::AddParent { id, parent });
        }
    }

    fn on_remove_parent(&mut self, id: Id, parent: Id, success: bool) {
        if success {
            self.emit(&SceneUpdate::RemoveParent { id, parent });
        }
    }

    fn on_delete_node(&mut self, id: Id, success: bool) {
        if success {
            self.emit(&SceneUpdate::DeleteNode { id });
        }
    }
}

// =============================================================================
// DESERIALIZER (REPLICA SIDE)
// =============================================================================

/// Input port that decodes updates and applies them to a replica
/// world model, keeping the origin's ids verbatim.
pub struct UpdateDeserializer {
    model: Arc<Mutex<WorldModel>>,
}

impl UpdateDeserializer {
    #[must_use]
    pub fn new(model: Arc<Mutex<WorldModel>>) -> Self {
        Self { model }
    }

    /// Apply one decoded update to the replica.
    pub fn apply(&self, update: SceneUpdate) -> Result<(), SceneGraphError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| SceneGraphError::IoError("replica model poisoned".to_string()))?;
        let scene = &mut model.scene;
        match update {
            SceneUpdate::AddNode {
                parent,
                id,
                attributes,
            } => scene.add_node_with_id(parent, id, attributes),
            SceneUpdate::AddGroup {
                parent,
                id,
                attributes,
            } => scene.add_group_with_id(parent, id, attributes),
            SceneUpdate::AddTransformNode {
                parent,
                id,
                attributes,
                pose,
                stamp,
            } => scene.add_transform_node_with_id(parent, id, attributes, pose, stamp),
            SceneUpdate::AddUncertainTransformNode {
                parent,
                id,
                attributes,
                pose,
                covariance,
                stamp,
            } => scene
                .add_uncertain_transform_node_with_id(parent, id, attributes, pose, covariance, stamp),
            SceneUpdate::AddGeometricNode {
                parent,
                id,
                attributes,
                shape,
                stamp,
            } => scene.add_geometric_node_with_id(parent, id, attributes, shape, stamp),
            SceneUpdate::AddRemoteRootNode { id, attributes } => {
                scene.add_remote_root_node(id, attributes)
            }
            SceneUpdate::AddConnection {
                parent,
                id,
                attributes,
                sources,
                targets,
                start,
                end,
            } => scene.add_connection_with_id(parent, id, attributes, sources, targets, start, end),
            SceneUpdate::SetNodeAttributes {
                id,
                attributes,
                stamp,
            } => scene.set_node_attributes(id, attributes, stamp),
            SceneUpdate::SetTransform { id, pose, stamp } => scene.set_transform(id, pose, stamp),
            SceneUpdate::SetUncertainTransform {
                id,
                pose,
                covariance,
                stamp,
            } => scene.set_uncertain_transform(id, pose, covariance, stamp),
            SceneUpdate::AddParent { id, parent } => scene.add_parent(id, parent),
            SceneUpdate::RemoveParent { id, parent } => scene.remove_parent(id, parent),
            SceneUpdate::DeleteNode { id } => scene.delete_node(id),
        }
    }
}

impl InputPort for UpdateDeserializer {
    fn write(&mut self, data: &[u8]) -> Result<usize, SceneGraphError> {
        let update: SceneUpdate = serde_json::from_slice(data)
            .map_err(|source| SceneGraphError::SerializationError(source.to_string()))?;
        self.apply(update)?;
        Ok(data.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_roundtrip() {
        let update = SceneUpdate::SetNodeAttributes {
            id: Id(42),
            attributes: vec![Attribute::new("name", "lamp")],
            stamp: TimeStamp::from_seconds(1.5),
        };

        let encoded = serde_json::to_vec(&update).expect("encode");
        let decoded: SceneUpdate = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, update);
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        let model = Arc::new(Mutex::new(WorldModel::new()));
        let mut port = UpdateDeserializer::new(model);

        let result = port.write(b"{ not json");
        assert!(matches!(
            result,
            Err(SceneGraphError::SerializationError(_))
        ));
    }

    #[test]
    fn deserializer_applies_with_origin_ids() {
        let model = Arc::new(Mutex::new(WorldModel::new()));
        let root = model.lock().expect("lock").root_id();
        let port = UpdateDeserializer::new(model.clone());

        port.apply(SceneUpdate::AddGroup {
            parent: root,
            id: Id(7),
            attributes: vec![Attribute::new("name", "imported")],
        })
        .expect("apply");

        let model = model.lock().expect("lock");
        assert!(model.scene.graph().contains(Id(7)));
        assert_eq!(
            model.scene.get_nodes(&[Attribute::new("name", "imported")]),
            vec![Id(7)]
        );
    }
}

//! # Scene Facade
//!
//! The single mutation entry point for the scene graph.
//!
//! Every mutating operation follows the same contract: validate the
//! request, apply it to the arena, notify the attached observers
//! synchronously in attachment order, then return the outcome.
//! Rejected operations are notified as well (with `success == false`)
//! unless [`Scene::set_notify_on_failure`] disabled that; this is what
//! lets a distributed setup observe attempts, not just effects.
//!
//! Every `add_*` operation has a `*_with_id` twin that forces a
//! caller-supplied id instead of generating one. The twins exist for
//! replication: a replica applying a remote update stream must keep
//! the origin's ids verbatim.
//!
//! The scene is not internally synchronized. Callers serialize access;
//! observers are behind `Arc<Mutex<..>>` so they can be shared with
//! transport code.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};

use crate::cache::{AccessPolicy, TemporalCache};
use crate::graph::{NodeKind, SceneGraph, SceneNode};
use crate::observer::UpdateObserver;
use crate::pose::{is_valid_pose, Covariance6, Pose};
use crate::time::TimeStamp;
use crate::traversal::{global_transform, traverse, AttributeFinder, Direction};
use crate::types::{Attribute, Id, IdGenerator, SceneGraphError, Shape};

/// Shared handle to an attached observer.
pub type ObserverHandle = Arc<Mutex<dyn UpdateObserver>>;

// =============================================================================
// SCENE
// =============================================================================

/// The scene-graph facade: arena + id generator + observer list.
pub struct Scene {
    graph: SceneGraph,
    generator: IdGenerator,
    observers: Vec<ObserverHandle>,
    notify_on_failure: bool,
}

impl Scene {
    /// Create a scene with a fresh root group.
    #[must_use]
    pub fn new() -> Self {
        let mut generator = IdGenerator::new();
        let root = generator.generate();
        Self {
            graph: SceneGraph::new(root, Vec::new()),
            generator,
            observers: Vec::new(),
            notify_on_failure: true,
        }
    }

    /// The root group's id.
    #[must_use]
    pub fn root_id(&self) -> Id {
        self.graph.root()
    }

    /// Read access to the underlying arena, for traversal and snapshots.
    #[must_use]
    pub const fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Total number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    // =========================================================================
    // OBSERVER MANAGEMENT
    // =========================================================================

    /// Attach an observer. Observers are notified in attachment order.
    pub fn attach_update_observer(&mut self, observer: ObserverHandle) {
        self.observers.push(observer);
    }

    /// Detach a previously attached observer (pointer identity).
    /// Returns whether it was found.
    pub fn detach_update_observer(&mut self, observer: &ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers
            .retain(|attached| !Arc::ptr_eq(attached, observer));
        self.observers.len() < before
    }

    /// Whether rejected operations are notified (default: yes).
    pub fn set_notify_on_failure(&mut self, notify_on_failure: bool) {
        self.notify_on_failure = notify_on_failure;
    }

    fn notify<F>(&self, success: bool, mut callback: F)
    where
        F: FnMut(&mut dyn UpdateObserver, bool),
    {
        if !success && !self.notify_on_failure {
            return;
        }
        for observer in &self.observers {
            if let Ok(mut guard) = observer.lock() {
                callback(&mut *guard, success);
            }
        }
    }

    // =========================================================================
    // NODE CREATION
    // =========================================================================

    /// Add a plain leaf node under `parent`.
    pub fn add_node(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_node_with_id(parent, id, attributes)?;
        Ok(id)
    }

    /// Add a plain leaf node with a forced id.
    pub fn add_node_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
    ) -> Result<(), SceneGraphError> {
        let result = self.attach_new(
            parent,
            SceneNode::new(id, attributes.clone(), NodeKind::Leaf),
        );
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_node(parent, id, &attributes, success);
        });
        result
    }

    /// Add an empty group under `parent`.
    pub fn add_group(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_group_with_id(parent, id, attributes)?;
        Ok(id)
    }

    /// Add an empty group with a forced id.
    pub fn add_group_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
    ) -> Result<(), SceneGraphError> {
        let result = self.attach_new(
            parent,
            SceneNode::new(
                id,
                attributes.clone(),
                NodeKind::Group { children: Vec::new() },
            ),
        );
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_group(parent, id, &attributes, success);
        });
        result
    }

    /// Add a transform node under `parent`, seeded with an initial pose.
    pub fn add_transform_node(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        stamp: TimeStamp,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_transform_node_with_id(parent, id, attributes, pose, stamp)?;
        Ok(id)
    }

    /// Add a transform node with a forced id.
    pub fn add_transform_node_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = if is_valid_pose(&pose) {
            self.attach_new(
                parent,
                SceneNode::new(
                    id,
                    attributes.clone(),
                    NodeKind::Transform {
                        children: Vec::new(),
                        history: seeded_history(pose, stamp),
                        covariance: None,
                    },
                ),
            )
        } else {
            Err(SceneGraphError::InvalidTransform)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_transform_node(parent, id, &attributes, &pose, stamp, success);
        });
        result
    }

    /// Add a transform node that also tracks pose covariance.
    pub fn add_uncertain_transform_node(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        covariance: Covariance6,
        stamp: TimeStamp,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_uncertain_transform_node_with_id(parent, id, attributes, pose, covariance, stamp)?;
        Ok(id)
    }

    /// Add an uncertain transform node with a forced id.
    pub fn add_uncertain_transform_node_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        pose: Pose,
        covariance: Covariance6,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = if is_valid_pose(&pose) && covariance.is_finite() {
            let mut covariance_history = TemporalCache::new(TemporalCache::<Covariance6>::DEFAULT_WINDOW);
            covariance_history.insert(covariance, stamp);
            self.attach_new(
                parent,
                SceneNode::new(
                    id,
                    attributes.clone(),
                    NodeKind::Transform {
                        children: Vec::new(),
                        history: seeded_history(pose, stamp),
                        covariance: Some(covariance_history),
                    },
                ),
            )
        } else {
            Err(SceneGraphError::InvalidTransform)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_uncertain_transform_node(
                parent,
                id,
                &attributes,
                &pose,
                &covariance,
                stamp,
                success,
            );
        });
        result
    }

    /// Add a geometric node carrying an opaque shape.
    pub fn add_geometric_node(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
        shape: Shape,
        stamp: TimeStamp,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_geometric_node_with_id(parent, id, attributes, shape, stamp)?;
        Ok(id)
    }

    /// Add a geometric node with a forced id.
    pub fn add_geometric_node_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        shape: Shape,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = if shape.is_valid() {
            self.attach_new(
                parent,
                SceneNode::new(
                    id,
                    attributes.clone(),
                    NodeKind::Geometric {
                        shape: shape.clone(),
                        stamp,
                    },
                ),
            )
        } else {
            Err(SceneGraphError::InvalidShape)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_geometric_node(parent, id, &attributes, &shape, stamp, success);
        });
        result
    }

    /// Import a root group from another world model instance, keeping
    /// its foreign id. The imported root survives without parents and
    /// can be grafted into the local graph via [`Scene::add_parent`].
    pub fn add_remote_root_node(
        &mut self,
        id: Id,
        attributes: Vec<Attribute>,
    ) -> Result<(), SceneGraphError> {
        let result = if id.is_nil() {
            Err(SceneGraphError::NodeNotFound(id))
        } else {
            self.graph.insert_remote_root(SceneNode::new(
                id,
                attributes.clone(),
                NodeKind::Group { children: Vec::new() },
            ))
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_remote_root_node(id, &attributes, success);
        });
        result
    }

    /// Add a connection (directed hyperedge) under `parent`, valid
    /// over `[start, end)`. All endpoints must already exist.
    pub fn add_connection(
        &mut self,
        parent: Id,
        attributes: Vec<Attribute>,
        sources: Vec<Id>,
        targets: Vec<Id>,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Result<Id, SceneGraphError> {
        let id = self.generator.generate();
        self.add_connection_with_id(parent, id, attributes, sources, targets, start, end)?;
        Ok(id)
    }

    /// Add a connection with a forced id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_connection_with_id(
        &mut self,
        parent: Id,
        id: Id,
        attributes: Vec<Attribute>,
        sources: Vec<Id>,
        targets: Vec<Id>,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let missing_endpoint = sources
            .iter()
            .chain(targets.iter())
            .find(|&&endpoint| !self.graph.contains(endpoint))
            .copied();
        let result = match missing_endpoint {
            Some(endpoint) => Err(SceneGraphError::NodeNotFound(endpoint)),
            None => self.attach_new(
                parent,
                SceneNode::new(
                    id,
                    attributes.clone(),
                    NodeKind::Connection {
                        sources: sources.clone(),
                        targets: targets.clone(),
                        start,
                        end,
                    },
                ),
            ),
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_connection(
                parent, id, &attributes, &sources, &targets, start, end, success,
            );
        });
        result
    }

    /// Validate the parent, then insert and link the fresh node.
    /// Insertion order guarantees `add_child` cannot introduce a cycle
    /// here: the new node has no children yet.
    fn attach_new(&mut self, parent: Id, node: SceneNode) -> Result<(), SceneGraphError> {
        let id = node.id;
        let parent_node = self.graph.require(parent)?;
        if parent_node.kind.children().is_none() {
            return Err(SceneGraphError::NotAGroup(parent));
        }
        self.graph.insert_node(node)?;
        self.graph.add_child(parent, id)?;
        debug!(node = %id, parent = %parent, "node attached");
        Ok(())
    }

    // =========================================================================
    // NODE UPDATES
    // =========================================================================

    /// Replace a node's attribute set.
    ///
    /// The stamp must not precede the last accepted attribute update;
    /// a stale stamp fails with [`SceneGraphError::StaleUpdate`] (and
    /// is still notified).
    pub fn set_node_attributes(
        &mut self,
        id: Id,
        attributes: Vec<Attribute>,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = match self.graph.node_mut(id) {
            None => Err(SceneGraphError::NodeNotFound(id)),
            Some(node) => {
                if stamp < node.attributes_stamp {
                    Err(SceneGraphError::StaleUpdate {
                        attempted: stamp,
                        last: node.attributes_stamp,
                    })
                } else {
                    node.attributes = attributes.clone();
                    node.attributes_stamp = stamp;
                    Ok(())
                }
            }
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_set_node_attributes(id, &attributes, stamp, success);
        });
        result
    }

    /// Record a new pose for a transform node.
    pub fn set_transform(
        &mut self,
        id: Id,
        pose: Pose,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = if is_valid_pose(&pose) {
            self.graph.insert_transform(id, pose, stamp)
        } else {
            Err(SceneGraphError::InvalidTransform)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_set_transform(id, &pose, stamp, success);
        });
        result
    }

    /// Record a new pose plus covariance for a transform node.
    /// A plain transform is promoted to uncertain on first use.
    pub fn set_uncertain_transform(
        &mut self,
        id: Id,
        pose: Pose,
        covariance: Covariance6,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let result = if is_valid_pose(&pose) && covariance.is_finite() {
            self.graph
                .insert_transform(id, pose, stamp)
                .and_then(|()| self.graph.insert_covariance(id, covariance, stamp))
        } else {
            Err(SceneGraphError::InvalidTransform)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_set_uncertain_transform(id, &pose, &covariance, stamp, success);
        });
        result
    }

    // =========================================================================
    // STRUCTURE UPDATES
    // =========================================================================

    /// Add an additional parent link, sharing `id` under `parent`.
    pub fn add_parent(&mut self, id: Id, parent: Id) -> Result<(), SceneGraphError> {
        let result = self.graph.add_child(parent, id);
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_add_parent(id, parent, success);
        });
        result
    }

    /// Remove one parent link. If it was the last, the node (and any
    /// children left unreachable) is collected.
    pub fn remove_parent(&mut self, id: Id, parent: Id) -> Result<(), SceneGraphError> {
        let result = self.graph.remove_child(parent, id);
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_remove_parent(id, parent, success);
        });
        result
    }

    /// Delete a node outright: detach it from every parent and collect
    /// the unreachable remainder. The root refuses deletion.
    pub fn delete_node(&mut self, id: Id) -> Result<(), SceneGraphError> {
        let result = if id == self.graph.root() {
            Err(SceneGraphError::CannotDeleteRoot)
        } else {
            self.graph.detach_and_collect(id)
        };
        log_outcome(&result);
        self.notify(result.is_ok(), |observer, success| {
            observer.on_delete_node(id, success);
        });
        result
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Ids of all nodes reachable from the root whose attributes
    /// contain every query attribute. Shared nodes appear once.
    #[must_use]
    pub fn get_nodes(&self, query: &[Attribute]) -> Vec<Id> {
        let mut finder = AttributeFinder::new(query.to_vec());
        // Traversal from the existing root cannot fail.
        if traverse(&self.graph, self.graph.root(), Direction::Downwards, &mut finder).is_err() {
            return Vec::new();
        }
        let mut seen = std::collections::BTreeSet::new();
        finder
            .matches
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// A node's current attribute set.
    pub fn get_node_attributes(&self, id: Id) -> Result<Vec<Attribute>, SceneGraphError> {
        Ok(self.graph.require(id)?.attributes.clone())
    }

    /// The node's pose relative to the root at the query time, composed
    /// along the first root-to-node path.
    pub fn get_transform_for_node(
        &self,
        id: Id,
        stamp: TimeStamp,
    ) -> Result<Pose, SceneGraphError> {
        global_transform(&self.graph, id, stamp, AccessPolicy::Closest)
    }

    /// A transform node's own (local) pose at the query time.
    /// `Ok(None)` when the history holds no data.
    pub fn get_local_transform(
        &self,
        id: Id,
        stamp: TimeStamp,
    ) -> Result<Option<Pose>, SceneGraphError> {
        self.graph.transform_at(id, stamp, AccessPolicy::Closest)
    }

    /// Source endpoints of a connection.
    pub fn get_connection_source_ids(&self, id: Id) -> Result<Vec<Id>, SceneGraphError> {
        match &self.graph.require(id)?.kind {
            NodeKind::Connection { sources, .. } => Ok(sources.clone()),
            _ => Err(SceneGraphError::NotAConnection(id)),
        }
    }

    /// Target endpoints of a connection.
    pub fn get_connection_target_ids(&self, id: Id) -> Result<Vec<Id>, SceneGraphError> {
        match &self.graph.require(id)?.kind {
            NodeKind::Connection { targets, .. } => Ok(targets.clone()),
            _ => Err(SceneGraphError::NotAConnection(id)),
        }
    }

    /// Validity interval `[start, end)` of a connection.
    pub fn get_connection_validity(
        &self,
        id: Id,
    ) -> Result<(TimeStamp, TimeStamp), SceneGraphError> {
        match &self.graph.require(id)?.kind {
            NodeKind::Connection { start, end, .. } => Ok((*start, *end)),
            _ => Err(SceneGraphError::NotAConnection(id)),
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejections surface in the log as well as the `Result`: temporal
/// rejections (duplicate or stale stamps, window violations) as
/// warnings, structural and validation failures as errors.
fn log_outcome(result: &Result<(), SceneGraphError>) {
    if let Err(source) = result {
        match source {
            SceneGraphError::DuplicateTimeStamp(_)
            | SceneGraphError::StaleUpdate { .. }
            | SceneGraphError::CacheLimitViolated(_) => {
                warn!(error = %source, "update rejected");
            }
            _ => error!(error = %source, "update failed"),
        }
    }
}

fn seeded_history(pose: Pose, stamp: TimeStamp) -> TemporalCache<Pose> {
    let mut history = TemporalCache::new(TemporalCache::<Pose>::DEFAULT_WINDOW);
    history.insert(pose, stamp);
    history
}

// =============================================================================
// TESTS
// =============================================================================

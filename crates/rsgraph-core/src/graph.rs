//! # Scene Graph Arena
//!
//! The owning store for all graph entities.
//!
//! Entities live in a `BTreeMap` arena keyed by [`Id`]; parent/child
//! edges are id references. Children are shared: a node may be listed
//! by several groups (the structure is a DAG, not a tree), and parent
//! entries are back-references used only for upward traversal and
//! carry no ownership. A node stays alive while it is reachable from
//! the root (or a remote root); removing its last parent link collects
//! it, cascading through any children that become unreachable.
//!
//! The arena enforces structural invariants (existing endpoints, group
//! capability, no self-ancestry) but performs no observer notification.
//! Mutations from outside go through the [`Scene`](crate::scene::Scene)
//! facade.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::{AccessPolicy, TemporalCache};
use crate::pose::{Covariance6, Pose};
use crate::time::TimeStamp;
use crate::types::{Attribute, Id, SceneGraphError};

// =============================================================================
// NODE KINDS
// =============================================================================

/// The closed set of entity variants.
///
/// Algorithms dispatch over this sum type through the
/// [`NodeVisitor`](crate::traversal::NodeVisitor) trait rather than
/// branching on it directly.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Plain node: a leaf, it may not have children.
    Leaf,
    /// Group: ordered sequence of shared children.
    Group {
        /// Child ids in insertion order.
        children: Vec<Id>,
    },
    /// Transform: a group that is also a pose source over time.
    Transform {
        children: Vec<Id>,
        /// Time-indexed pose history.
        history: TemporalCache<Pose>,
        /// Pose covariance history; present only for uncertain transforms.
        covariance: Option<TemporalCache<Covariance6>>,
    },
    /// Geometric node: a leaf carrying an immutable shape.
    Geometric {
        shape: crate::types::Shape,
        /// Creation/observation time of the shape.
        stamp: TimeStamp,
    },
    /// Connection: a directed hyperedge with a validity interval.
    ///
    /// The interval `[start, end)` is informational; connections are
    /// never auto-expired by time.
    Connection {
        sources: Vec<Id>,
        targets: Vec<Id>,
        start: TimeStamp,
        end: TimeStamp,
    },
}

impl NodeKind {
    /// Child list, if this kind can hold children.
    #[must_use]
    pub fn children(&self) -> Option<&Vec<Id>> {
        match self {
            Self::Group { children } | Self::Transform { children, .. } => Some(children),
            Self::Leaf | Self::Geometric { .. } | Self::Connection { .. } => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Id>> {
        match self {
            Self::Group { children } | Self::Transform { children, .. } => Some(children),
            Self::Leaf | Self::Geometric { .. } | Self::Connection { .. } => None,
        }
    }
}

// =============================================================================
// SCENE NODE
// =============================================================================

/// One entity in the arena.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Graph-wide unique identifier.
    pub id: Id,
    /// Ordered attribute set; duplicate keys are permitted.
    pub attributes: Vec<Attribute>,
    /// Stamp of the last accepted attribute update (stale-update guard).
    pub attributes_stamp: TimeStamp,
    /// Parent back-references, in link order. Traversal only.
    pub parents: Vec<Id>,
    /// The entity variant.
    pub kind: NodeKind,
}

impl SceneNode {
    /// Create a node with the given id, attributes and kind.
    #[must_use]
    pub fn new(id: Id, attributes: Vec<Attribute>, kind: NodeKind) -> Self {
        Self {
            id,
            attributes,
            attributes_stamp: TimeStamp::ZERO,
            parents: Vec::new(),
            kind,
        }
    }

    /// Number of parent links.
    #[must_use]
    pub fn number_of_parents(&self) -> usize {
        self.parents.len()
    }

    /// Parent id at the given position, if any.
    #[must_use]
    pub fn parent(&self, index: usize) -> Option<Id> {
        self.parents.get(index).copied()
    }

    /// Child ids; empty for leaf kinds.
    #[must_use]
    pub fn children(&self) -> &[Id] {
        self.kind.children().map_or(&[], |children| children)
    }

    /// Number of children.
    #[must_use]
    pub fn number_of_children(&self) -> usize {
        self.children().len()
    }

    /// Child id at the given position, if any.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Id> {
        self.children().get(index).copied()
    }
}

// =============================================================================
// SCENE GRAPH
// =============================================================================

/// The arena of all scene entities plus the root bookkeeping.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    /// Node storage: Id -> SceneNode, deterministic iteration order.
    nodes: BTreeMap<Id, SceneNode>,
    /// The local root group.
    root: Id,
    /// Imported remote roots; exempt from unreachability collection.
    remote_roots: BTreeSet<Id>,
}

impl SceneGraph {
    /// Create a graph whose root is an empty group with the given id.
    #[must_use]
    pub fn new(root_id: Id, root_attributes: Vec<Attribute>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root_id,
            SceneNode::new(root_id, root_attributes, NodeKind::Group { children: Vec::new() }),
        );
        Self {
            nodes,
            root: root_id,
            remote_roots: BTreeSet::new(),
        }
    }

    /// The local root id.
    #[must_use]
    pub const fn root(&self) -> Id {
        self.root
    }

    /// Whether a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: Id) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, id: Id) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Look up a node, reporting absence as an error.
    pub fn require(&self, id: Id) -> Result<&SceneNode, SceneGraphError> {
        self.nodes.get(&id).ok_or(SceneGraphError::NodeNotFound(id))
    }

    /// All nodes in deterministic id order.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether this id was imported as a remote root.
    #[must_use]
    pub fn is_remote_root(&self, id: Id) -> bool {
        self.remote_roots.contains(&id)
    }

    /// Ids of all imported remote roots, in order.
    pub fn remote_roots(&self) -> impl Iterator<Item = Id> + '_ {
        self.remote_roots.iter().copied()
    }

    // =========================================================================
    // STRUCTURAL MUTATION
    // =========================================================================

    /// Insert a detached node into the arena.
    pub fn insert_node(&mut self, node: SceneNode) -> Result<(), SceneGraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(SceneGraphError::IdAlreadyInUse(node.id));
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Register an imported remote root. The node keeps its foreign id
    /// and survives without parents until grafted via `add_child`.
    pub fn insert_remote_root(&mut self, node: SceneNode) -> Result<(), SceneGraphError> {
        let id = node.id;
        self.insert_node(node)?;
        self.remote_roots.insert(id);
        Ok(())
    }

    /// Append `child` to `parent`'s child list and register the parent
    /// back-reference. Shared children (multiple parents) are allowed;
    /// self-loops and ancestor cycles are refused.
    pub fn add_child(&mut self, parent: Id, child: Id) -> Result<(), SceneGraphError> {
        let index = self.require(parent)?.number_of_children();
        self.insert_child(parent, child, index)
    }

    /// Insert `child` at `index` in `parent`'s child list
    /// (clamped to the current length).
    pub fn insert_child(
        &mut self,
        parent: Id,
        child: Id,
        index: usize,
    ) -> Result<(), SceneGraphError> {
        self.require(parent)?;
        self.require(child)?;
        if parent == child || self.is_ancestor_of(child, parent) {
            return Err(SceneGraphError::CycleDetected(child));
        }

        {
            let parent_node = self
                .nodes
                .get_mut(&parent)
                .ok_or(SceneGraphError::NodeNotFound(parent))?;
            let children = parent_node
                .kind
                .children_mut()
                .ok_or(SceneGraphError::NotAGroup(parent))?;
            let position = index.min(children.len());
            children.insert(position, child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parents.push(parent);
        }
        Ok(())
    }

    /// Remove exactly one `parent`→`child` linkage. If the child loses
    /// its last parent it becomes unreachable and is collected,
    /// cascading through its own children.
    pub fn remove_child(&mut self, parent: Id, child: Id) -> Result<(), SceneGraphError> {
        {
            let parent_node = self
                .nodes
                .get_mut(&parent)
                .ok_or(SceneGraphError::NodeNotFound(parent))?;
            let children = parent_node
                .kind
                .children_mut()
                .ok_or(SceneGraphError::NotAGroup(parent))?;
            let position = children
                .iter()
                .position(|&candidate| candidate == child)
                .ok_or(SceneGraphError::NodeNotFound(child))?;
            children.remove(position);
        }
        self.drop_parent_backreference(child, parent);
        self.collect_if_unreachable(child);
        Ok(())
    }

    /// Remove the child at `index` from `parent`'s child list.
    pub fn remove_children(&mut self, parent: Id, index: usize) -> Result<(), SceneGraphError> {
        let child = self
            .require(parent)?
            .child(index)
            .ok_or(SceneGraphError::NodeNotFound(parent))?;
        self.remove_child(parent, child)
    }

    /// Detach `id` from every parent and collect the unreachable
    /// remainder. The caller has already checked `id != root`.
    pub fn detach_and_collect(&mut self, id: Id) -> Result<(), SceneGraphError> {
        let parents = self.require(id)?.parents.clone();
        for parent in parents {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                if let Some(children) = parent_node.kind.children_mut() {
                    children.retain(|&candidate| candidate != id);
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parents.clear();
        }
        self.remote_roots.remove(&id);
        self.collect_if_unreachable(id);
        Ok(())
    }

    /// Drop one occurrence of `parent` from `child`'s back-references.
    fn drop_parent_backreference(&mut self, child: Id, parent: Id) {
        if let Some(child_node) = self.nodes.get_mut(&child) {
            if let Some(position) = child_node
                .parents
                .iter()
                .position(|&candidate| candidate == parent)
            {
                child_node.parents.remove(position);
            }
        }
    }

    /// Remove `id` from the arena if nothing reaches it any more,
    /// cascading through children that become unreachable in turn.
    fn collect_if_unreachable(&mut self, id: Id) {
        let reachable = match self.nodes.get(&id) {
            Some(node) => {
                id == self.root || self.remote_roots.contains(&id) || !node.parents.is_empty()
            }
            None => return,
        };
        if reachable {
            return;
        }
        let Some(removed) = self.nodes.remove(&id) else {
            return;
        };
        for child in removed.children().to_vec() {
            self.drop_parent_backreference(child, id);
            self.collect_if_unreachable(child);
        }
    }

    /// Whether `ancestor` lies on any upward path from `node`.
    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: Id, node: Id) -> bool {
        let mut stack = vec![node];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if current == ancestor {
                return true;
            }
            if let Some(current_node) = self.nodes.get(&current) {
                stack.extend(current_node.parents.iter().copied());
            }
        }
        false
    }

    // =========================================================================
    // TRANSFORM ACCESS
    // =========================================================================

    /// Insert a pose into a transform node's history.
    pub fn insert_transform(
        &mut self,
        id: Id,
        pose: Pose,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(SceneGraphError::NodeNotFound(id))?;
        let NodeKind::Transform { history, .. } = &mut node.kind else {
            return Err(SceneGraphError::NotATransform(id));
        };
        insert_checked(history, pose, stamp)
    }

    /// Insert a pose covariance into an uncertain transform's history.
    /// Plain transforms are promoted on first covariance insertion.
    pub fn insert_covariance(
        &mut self,
        id: Id,
        value: Covariance6,
        stamp: TimeStamp,
    ) -> Result<(), SceneGraphError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(SceneGraphError::NodeNotFound(id))?;
        let NodeKind::Transform {
            covariance, history, ..
        } = &mut node.kind
        else {
            return Err(SceneGraphError::NotATransform(id));
        };
        let cache = covariance
            .get_or_insert_with(|| TemporalCache::new(history.max_history_duration()));
        insert_checked(cache, value, stamp)
    }

    /// The pose of a transform node at a query time.
    /// `Ok(None)` means the history is empty ("no data").
    pub fn transform_at(
        &self,
        id: Id,
        stamp: TimeStamp,
        policy: AccessPolicy,
    ) -> Result<Option<Pose>, SceneGraphError> {
        let node = self.require(id)?;
        let NodeKind::Transform { history, .. } = &node.kind else {
            return Err(SceneGraphError::NotATransform(id));
        };
        Ok(history.get(stamp, policy).copied())
    }
}

/// Map a rejected cache insertion to the precise error cause.
fn insert_checked<T>(
    cache: &mut TemporalCache<T>,
    value: T,
    stamp: TimeStamp,
) -> Result<(), SceneGraphError> {
    if cache.iter().any(|(_, stored)| stored == stamp) {
        return Err(SceneGraphError::DuplicateTimeStamp(stamp));
    }
    if cache.insert(value, stamp) {
        Ok(())
    } else {
        Err(SceneGraphError::CacheLimitViolated(stamp))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::pose_from_translation;
    use crate::time::Duration;
    use glam::DVec3;

    fn leaf(id: u128) -> SceneNode {
        SceneNode::new(Id(id), Vec::new(), NodeKind::Leaf)
    }

    fn group(id: u128) -> SceneNode {
        SceneNode::new(Id(id), Vec::new(), NodeKind::Group { children: Vec::new() })
    }

    fn transform(id: u128) -> SceneNode {
        SceneNode::new(
            Id(id),
            Vec::new(),
            NodeKind::Transform {
                children: Vec::new(),
                history: TemporalCache::new(Duration::from_seconds(20.0)),
                covariance: None,
            },
        )
    }

    #[test]
    fn child_and_parent_bookkeeping() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(leaf(42)).expect("insert");
        graph.insert_node(leaf(123)).expect("insert");

        graph.add_child(Id(1), Id(42)).expect("add child");
        let root = graph.node(Id(1)).expect("root");
        assert_eq!(root.number_of_children(), 1);
        assert_eq!(root.number_of_parents(), 0);
        assert_eq!(graph.node(Id(42)).expect("child").number_of_parents(), 1);
        assert_eq!(graph.node(Id(42)).expect("child").parent(0), Some(Id(1)));

        // Insert on first place.
        graph.insert_child(Id(1), Id(123), 0).expect("insert child");
        let root = graph.node(Id(1)).expect("root");
        assert_eq!(root.number_of_children(), 2);
        assert_eq!(root.child(0), Some(Id(123)));
        assert_eq!(root.child(1), Some(Id(42)));
    }

    #[test]
    fn leaf_cannot_hold_children() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(leaf(2)).expect("insert");
        graph.insert_node(leaf(3)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add child");

        let result = graph.add_child(Id(2), Id(3));
        assert!(matches!(result, Err(SceneGraphError::NotAGroup(_))));
    }

    #[test]
    fn shared_child_has_two_parents() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(group(2)).expect("insert");
        graph.insert_node(group(3)).expect("insert");
        graph.insert_node(leaf(4)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");
        graph.add_child(Id(1), Id(3)).expect("add");

        graph.add_child(Id(2), Id(4)).expect("add");
        graph.add_child(Id(3), Id(4)).expect("add");
        assert_eq!(graph.node(Id(4)).expect("node").number_of_parents(), 2);

        // Removing one linkage leaves the other untouched.
        graph.remove_child(Id(2), Id(4)).expect("remove");
        let shared = graph.node(Id(4)).expect("node");
        assert_eq!(shared.number_of_parents(), 1);
        assert_eq!(shared.parent(0), Some(Id(3)));
    }

    #[test]
    fn unreachable_subtree_is_collected_cascading() {
        // root -> g2, g3; g2 -> g4; g3 -> g4; g4 -> leaf5
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(group(2)).expect("insert");
        graph.insert_node(group(3)).expect("insert");
        graph.insert_node(group(4)).expect("insert");
        graph.insert_node(leaf(5)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");
        graph.add_child(Id(1), Id(3)).expect("add");
        graph.add_child(Id(2), Id(4)).expect("add");
        graph.add_child(Id(3), Id(4)).expect("add");
        graph.add_child(Id(4), Id(5)).expect("add");

        // g4 survives the first unlink through its second parent.
        graph.remove_children(Id(1), 0).expect("remove g2");
        assert!(!graph.contains(Id(2)));
        assert!(graph.contains(Id(4)));
        assert_eq!(graph.node(Id(4)).expect("g4").number_of_parents(), 1);

        // Unlinking the second path collects g4 and leaf5.
        graph.remove_child(Id(3), Id(4)).expect("remove g4");
        assert!(!graph.contains(Id(4)));
        assert!(!graph.contains(Id(5)));
        assert!(graph.contains(Id(3)));
    }

    #[test]
    fn cycle_is_refused() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(group(2)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");

        assert!(matches!(
            graph.add_child(Id(2), Id(2)),
            Err(SceneGraphError::CycleDetected(_))
        ));
        assert!(matches!(
            graph.add_child(Id(2), Id(1)),
            Err(SceneGraphError::CycleDetected(_))
        ));
    }

    #[test]
    fn remote_root_survives_without_parents() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        let foreign = Id(0xdead_beef);
        graph
            .insert_remote_root(SceneNode::new(
                foreign,
                Vec::new(),
                NodeKind::Group { children: Vec::new() },
            ))
            .expect("insert");

        assert!(graph.is_remote_root(foreign));
        graph.collect_if_unreachable(foreign);
        assert!(graph.contains(foreign));
    }

    #[test]
    fn transform_history_roundtrip() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(transform(2)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");

        let pose = pose_from_translation(DVec3::new(1.0, 2.0, 3.0));
        graph
            .insert_transform(Id(2), pose, TimeStamp::from_seconds(1.0))
            .expect("insert transform");

        let stored = graph
            .transform_at(Id(2), TimeStamp::from_seconds(1.0), AccessPolicy::Closest)
            .expect("query")
            .expect("pose present");
        assert_eq!(stored, pose);

        // Duplicate stamp is a distinct error from a window violation.
        let duplicate = graph.insert_transform(Id(2), pose, TimeStamp::from_seconds(1.0));
        assert!(matches!(
            duplicate,
            Err(SceneGraphError::DuplicateTimeStamp(_))
        ));

        let too_old =
            graph.insert_transform(Id(2), pose, TimeStamp::from_seconds(-100.0));
        assert!(matches!(
            too_old,
            Err(SceneGraphError::CacheLimitViolated(_))
        ));
    }

    #[test]
    fn transform_queries_on_wrong_kind_fail() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(leaf(2)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");

        assert!(matches!(
            graph.transform_at(Id(2), TimeStamp::ZERO, AccessPolicy::Closest),
            Err(SceneGraphError::NotATransform(_))
        ));
        assert!(matches!(
            graph.transform_at(Id(99), TimeStamp::ZERO, AccessPolicy::Closest),
            Err(SceneGraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn covariance_promotes_plain_transform() {
        let mut graph = SceneGraph::new(Id(1), Vec::new());
        graph.insert_node(transform(2)).expect("insert");
        graph.add_child(Id(1), Id(2)).expect("add");

        graph
            .insert_covariance(
                Id(2),
                Covariance6::from_diagonal([0.1; 6]),
                TimeStamp::from_seconds(1.0),
            )
            .expect("insert covariance");

        let node = graph.node(Id(2)).expect("node");
        let NodeKind::Transform { covariance, .. } = &node.kind else {
            unreachable!("kind changed");
        };
        assert!(covariance.as_ref().is_some_and(|cache| cache.len() == 1));
    }
}

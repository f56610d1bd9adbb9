//! # Graph Traversal
//!
//! Visitor-based traversal over the scene graph.
//!
//! Traversal is depth-first preorder without a visited set: a node
//! shared by several parents is visited once per path, which is what
//! path-dependent algorithms (path collection, pose composition)
//! rely on. The graph is a DAG by construction, so traversal always
//! terminates.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::cache::AccessPolicy;
use crate::graph::{NodeKind, SceneGraph, SceneNode};
use crate::pose::Pose;
use crate::time::TimeStamp;
use crate::types::{attributes_match, Attribute, Id, SceneGraphError};

// =============================================================================
// VISITOR
// =============================================================================

/// Traversal direction relative to the start node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow child edges.
    Downwards,
    /// Follow parent back-references.
    Upwards,
}

/// Per-kind callbacks invoked at every node encounter.
///
/// All kind-specific methods default to the catch-all [`visit`]
/// so kind-agnostic visitors override a single method.
///
/// [`visit`]: NodeVisitor::visit
pub trait NodeVisitor {
    /// Catch-all callback, invoked by the per-kind defaults.
    fn visit(&mut self, node: &SceneNode) {
        let _ = node;
    }

    fn visit_leaf(&mut self, node: &SceneNode) {
        self.visit(node);
    }

    fn visit_group(&mut self, node: &SceneNode) {
        self.visit(node);
    }

    fn visit_transform(&mut self, node: &SceneNode) {
        self.visit(node);
    }

    fn visit_geometric(&mut self, node: &SceneNode) {
        self.visit(node);
    }

    fn visit_connection(&mut self, node: &SceneNode) {
        self.visit(node);
    }
}

fn dispatch<V: NodeVisitor + ?Sized>(visitor: &mut V, node: &SceneNode) {
    match &node.kind {
        NodeKind::Leaf => visitor.visit_leaf(node),
        NodeKind::Group { .. } => visitor.visit_group(node),
        NodeKind::Transform { .. } => visitor.visit_transform(node),
        NodeKind::Geometric { .. } => visitor.visit_geometric(node),
        NodeKind::Connection { .. } => visitor.visit_connection(node),
    }
}

/// Depth-first preorder traversal from `start`.
///
/// Shared nodes are visited once per incoming path; there is no
/// deduplication. Connections are visited where encountered but their
/// source/target references are not followed.
pub fn traverse<V: NodeVisitor + ?Sized>(
    graph: &SceneGraph,
    start: Id,
    direction: Direction,
    visitor: &mut V,
) -> Result<(), SceneGraphError> {
    let node = graph.require(start)?;
    dispatch(visitor, node);

    let next: Vec<Id> = match direction {
        Direction::Downwards => node.children().to_vec(),
        Direction::Upwards => node.parents.clone(),
    };
    for neighbour in next {
        traverse(graph, neighbour, direction, visitor)?;
    }
    Ok(())
}

// =============================================================================
// ID COLLECTOR
// =============================================================================

/// Records every visited id in traversal order, duplicates included.
#[derive(Debug, Default)]
pub struct IdCollector {
    /// Visited ids in encounter order.
    pub ids: Vec<Id>,
}

impl IdCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeVisitor for IdCollector {
    fn visit(&mut self, node: &SceneNode) {
        self.ids.push(node.id);
    }
}

// =============================================================================
// ATTRIBUTE FINDER
// =============================================================================

/// Collects the ids of visited nodes whose attribute set contains
/// every query attribute (conjunctive match).
#[derive(Debug)]
pub struct AttributeFinder {
    query: Vec<Attribute>,
    /// Matching ids in encounter order.
    pub matches: Vec<Id>,
}

impl AttributeFinder {
    #[must_use]
    pub fn new(query: Vec<Attribute>) -> Self {
        Self {
            query,
            matches: Vec::new(),
        }
    }
}

impl NodeVisitor for AttributeFinder {
    fn visit(&mut self, node: &SceneNode) {
        if attributes_match(&node.attributes, &self.query) {
            self.matches.push(node.id);
        }
    }
}

// =============================================================================
// PATH COLLECTOR
// =============================================================================

/// Collects every root-to-node path for a start node.
///
/// Each path lists ids root-first and excludes the start node itself.
/// Collecting from the root yields exactly one empty path. A node
/// reachable through several parents yields one path per route.
#[derive(Debug, Default)]
pub struct PathCollector {
    /// Collected paths, in upward-traversal discovery order.
    pub paths: Vec<Vec<Id>>,
}

impl PathCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the upward collection from `start`.
    pub fn collect(&mut self, graph: &SceneGraph, start: Id) -> Result<(), SceneGraphError> {
        graph.require(start)?;
        self.paths.clear();
        let mut ancestors = Vec::new();
        self.ascend(graph, start, start, &mut ancestors);
        Ok(())
    }

    fn ascend(&mut self, graph: &SceneGraph, current: Id, start: Id, ancestors: &mut Vec<Id>) {
        let Some(node) = graph.node(current) else {
            return;
        };
        if current != start {
            ancestors.push(current);
        }
        if node.parents.is_empty() {
            // Reached a root: the accumulated ancestors are leaf-first.
            let mut path: Vec<Id> = ancestors.clone();
            path.reverse();
            self.paths.push(path);
        } else {
            for &parent in &node.parents {
                self.ascend(graph, parent, start, ancestors);
            }
        }
        if current != start {
            ancestors.pop();
        }
    }
}

// =============================================================================
// GLOBAL TRANSFORM
// =============================================================================

/// Compose the poses along a root-first path of node ids, then the
/// end node itself. Non-transform nodes and transforms without data
/// at the query time contribute identity.
pub fn transform_along_path(
    graph: &SceneGraph,
    path: &[Id],
    end: Id,
    stamp: TimeStamp,
    policy: AccessPolicy,
) -> Result<Pose, SceneGraphError> {
    let mut accumulated = Pose::IDENTITY;
    for &id in path.iter().chain(std::iter::once(&end)) {
        let node = graph.require(id)?;
        if let NodeKind::Transform { history, .. } = &node.kind {
            if let Some(pose) = history.get(stamp, policy) {
                accumulated *= *pose;
            }
        }
    }
    Ok(accumulated)
}

/// The pose of `id` relative to the root at the query time.
///
/// Composes transform poses along the first discovered root-to-node
/// path. With a DAG of consistent transforms all paths agree; if they
/// do not, the first path wins.
pub fn global_transform(
    graph: &SceneGraph,
    id: Id,
    stamp: TimeStamp,
    policy: AccessPolicy,
) -> Result<Pose, SceneGraphError> {
    let mut collector = PathCollector::new();
    collector.collect(graph, id)?;
    let path = collector.paths.first().map_or(&[][..], Vec::as_slice);
    transform_along_path(graph, path, id, stamp, policy)
}

// =============================================================================
// DOT GRAPH GENERATOR
// =============================================================================

/// Renders the reachable graph as a Graphviz DOT document.
///
/// Node labels use the `"name"` attribute when present, the id
/// otherwise. Shared nodes are declared once; every parent/child edge
/// is emitted.
#[derive(Debug, Default)]
pub struct DotGraphGenerator {
    declared: BTreeSet<Id>,
    nodes: String,
    edges: String,
}

impl DotGraphGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, node: &SceneNode, shape: &str) -> bool {
        if !self.declared.insert(node.id) {
            return false;
        }
        let label = node
            .attributes
            .iter()
            .find(|attribute| attribute.key == "name")
            .map_or_else(|| node.id.to_string(), |attribute| attribute.value.clone());
        let _ = writeln!(
            self.nodes,
            "  \"{}\" [label=\"{label}\", shape={shape}];",
            node.id
        );
        for &child in node.children() {
            let _ = writeln!(self.edges, "  \"{}\" -> \"{child}\";", node.id);
        }
        true
    }

    /// The assembled DOT document.
    #[must_use]
    pub fn into_dot(self) -> String {
        format!("digraph scene {{\n{}{}}}\n", self.nodes, self.edges)
    }
}

impl NodeVisitor for DotGraphGenerator {
    fn visit_leaf(&mut self, node: &SceneNode) {
        self.declare(node, "ellipse");
    }

    fn visit_group(&mut self, node: &SceneNode) {
        self.declare(node, "box");
    }

    fn visit_transform(&mut self, node: &SceneNode) {
        self.declare(node, "diamond");
    }

    fn visit_geometric(&mut self, node: &SceneNode) {
        self.declare(node, "hexagon");
    }

    fn visit_connection(&mut self, node: &SceneNode) {
        // Hyperedge endpoints render as dashed arcs through the
        // connection node; parent/child edges stay solid.
        if !self.declare(node, "cds") {
            return;
        }
        if let NodeKind::Connection {
            sources, targets, ..
        } = &node.kind
        {
            for &source in sources {
                let _ = writeln!(
                    self.edges,
                    "  \"{source}\" -> \"{}\" [style=dashed];",
                    node.id
                );
            }
            for &target in targets {
                let _ = writeln!(
                    self.edges,
                    "  \"{}\" -> \"{target}\" [style=dashed];",
                    node.id
                );
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

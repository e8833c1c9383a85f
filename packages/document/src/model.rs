//! # Hierarchy Model
//!
//! In-memory form of a library hierarchy document.
//!
//! Nodes and parent edges are stored in insertion order. A parent edge is
//! one directed connection `parent -> child` as drawn on the diagram; the
//! parent of a node is derived from its incoming edges, never stored as a
//! back-reference. A node may transiently have several incoming edges while
//! the user rewires connections; the validator rejects that at save time.

use crate::xml::{Attributes, XmlElement, XmlNode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Library id of the framework root
pub const ROOT_LIBRARY_ID: &str = "root";

/// Diagram element id of the framework root
pub const ROOT_ELEMENT_ID: &str = "SubProcess_Root";

/// Root label used when no framework name is known
pub const DEFAULT_ROOT_NAME: &str = "Framework Root";

pub const LIBRARY_WIDTH: f64 = 260.0;
pub const LIBRARY_HEIGHT: f64 = 60.0;

/// The four library attributes a document carries per node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryAttributes {
    pub library_id: String,
    pub library_name: String,
    pub framework_id: Option<String>,
    pub description: Option<String>,
}

/// One library in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryNode {
    /// Stable node id, equal to `attributes.library_id`
    pub id: String,

    /// Display name shown on the diagram
    pub name: String,

    pub attributes: LibraryAttributes,

    /// Id of the diagram element representing this library
    pub element_id: String,
}

impl LibraryNode {
    pub fn new(
        id: impl Into<String>,
        element_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            attributes: LibraryAttributes {
                library_id: id.clone(),
                library_name: name.clone(),
                framework_id: None,
                description: None,
            },
            id,
            name,
            element_id: element_id.into(),
        }
    }

    /// The framework root node
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(ROOT_LIBRARY_ID, ROOT_ELEMENT_ID, name)
    }

    pub fn with_framework_id(mut self, framework_id: impl Into<String>) -> Self {
        self.attributes.framework_id = Some(framework_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.attributes.description = Some(description.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_LIBRARY_ID
    }
}

/// Directed connection from a parent library to a child library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentEdge {
    /// Diagram element id of the connection
    pub id: String,
    pub parent: String,
    pub child: String,
}

impl ParentEdge {
    pub fn new(id: impl Into<String>, parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: parent.into(),
            child: child.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Default-sized library box at the given position
    pub fn library_at(x: f64, y: f64) -> Self {
        Self::new(x, y, LIBRARY_WIDTH, LIBRARY_HEIGHT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

/// Diagram shape of one library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramShape {
    /// Id of the shape element itself (`SubProcess_Root_di`)
    pub shape_id: String,
    pub bounds: Bounds,

    /// Shape attributes not interpreted here (`isExpanded`, ...)
    #[serde(default)]
    pub attributes: Attributes,

    /// Shape children other than the bounds (labels, extensions)
    #[serde(default)]
    pub children: Vec<XmlElement>,
}

impl DiagramShape {
    pub fn new(shape_id: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            shape_id: shape_id.into(),
            bounds,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Shape for an element following the `<element>_di` convention
    pub fn for_element(element_id: &str, bounds: Bounds) -> Self {
        Self::new(format!("{}_di", element_id), bounds)
    }
}

/// Diagram route of one parent edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLayout {
    pub edge_id: String,
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<XmlElement>,
}

impl EdgeLayout {
    pub fn new(edge_id: impl Into<String>, waypoints: Vec<Waypoint>) -> Self {
        Self {
            edge_id: edge_id.into(),
            waypoints,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Straight route from the bottom of `parent` to the top of `child`
    pub fn between(connection_id: &str, parent: &Bounds, child: &Bounds) -> Self {
        Self::new(
            format!("{}_di", connection_id),
            vec![
                Waypoint {
                    x: parent.x + parent.width / 2.0,
                    y: parent.y + parent.height,
                },
                Waypoint {
                    x: child.x + child.width / 2.0,
                    y: child.y,
                },
            ],
        )
    }
}

/// Positional metadata keyed by node id and edge id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagramLayout {
    pub shapes: IndexMap<String, DiagramShape>,
    pub edges: IndexMap<String, EdgeLayout>,
}

/// Unknown attributes and children of one library element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementResidue {
    pub attributes: Attributes,
    pub children: Vec<XmlNode>,
}

impl ElementResidue {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}

/// Document content carried through decode and encode without interpretation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpaqueContent {
    pub definitions: Attributes,
    pub process: Attributes,
    pub diagram: Attributes,
    pub plane: Attributes,

    /// Unknown top-level children of the definitions element
    pub definitions_children: Vec<XmlElement>,

    /// Diagram children other than the interpreted plane
    pub diagram_children: Vec<XmlElement>,

    /// Process children that are neither libraries nor library connections
    pub process_children: Vec<XmlElement>,

    /// Plane children that belong to neither a library nor a connection
    pub plane_children: Vec<XmlElement>,

    /// Per-node residue, keyed by node id
    pub residues: IndexMap<String, ElementResidue>,

    /// Per-connection residue, keyed by edge id
    pub edge_residues: IndexMap<String, ElementResidue>,
}

/// Derived parent/child index over a tree's edges
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    children: IndexMap<String, Vec<String>>,
    parents: IndexMap<String, Vec<String>>,
}

impl Adjacency {
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents_of(&self, id: &str) -> &[String] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming_count(&self, id: &str) -> usize {
        self.parents_of(id).len()
    }
}

/// The library hierarchy with its diagram metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HierarchyTree {
    nodes: IndexMap<String, LibraryNode>,
    edges: IndexMap<String, ParentEdge>,
    pub layout: DiagramLayout,
    pub opaque: OpaqueContent,
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&LibraryNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut LibraryNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LibraryNode> {
        self.nodes.values()
    }

    pub fn root(&self) -> Option<&LibraryNode> {
        self.nodes.get(ROOT_LIBRARY_ID)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn node_by_element(&self, element_id: &str) -> Option<&LibraryNode> {
        self.nodes.values().find(|node| node.element_id == element_id)
    }

    /// Insert a node, at `index` when given, otherwise at the end.
    /// Replaces any node with the same id in place.
    pub fn insert_node(&mut self, node: LibraryNode, index: Option<usize>) {
        let id = node.id.clone();
        match index {
            Some(index) if !self.nodes.contains_key(&id) => {
                let index = index.min(self.nodes.len());
                self.nodes.shift_insert(index, id, node);
            }
            _ => {
                self.nodes.insert(id, node);
            }
        }
    }

    /// Remove a node only; edges and layout are the caller's concern
    pub fn remove_node(&mut self, id: &str) -> Option<(usize, LibraryNode)> {
        self.nodes
            .shift_remove_full(id)
            .map(|(index, _, node)| (index, node))
    }

    pub fn edge(&self, id: &str) -> Option<&ParentEdge> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut ParentEdge> {
        self.edges.get_mut(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &ParentEdge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_index(&self, id: &str) -> Option<usize> {
        self.edges.get_index_of(id)
    }

    pub fn insert_edge(&mut self, edge: ParentEdge, index: Option<usize>) {
        let id = edge.id.clone();
        match index {
            Some(index) if !self.edges.contains_key(&id) => {
                let index = index.min(self.edges.len());
                self.edges.shift_insert(index, id, edge);
            }
            _ => {
                self.edges.insert(id, edge);
            }
        }
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<(usize, ParentEdge)> {
        self.edges
            .shift_remove_full(id)
            .map(|(index, _, edge)| (index, edge))
    }

    /// Edges touching a node, in edge order
    pub fn incident_edges(&self, id: &str) -> Vec<&ParentEdge> {
        self.edges
            .values()
            .filter(|edge| edge.parent == id || edge.child == id)
            .collect()
    }

    /// Every parent recorded for a node, one per incoming edge
    pub fn parent_ids(&self, id: &str) -> Vec<&str> {
        self.edges
            .values()
            .filter(|edge| edge.child == id)
            .map(|edge| edge.parent.as_str())
            .collect()
    }

    /// Parent of a node, `None` for the root and for unconnected nodes.
    /// When a node has several incoming edges the first one wins.
    pub fn parent_id(&self, id: &str) -> Option<&str> {
        self.edges
            .values()
            .find(|edge| edge.child == id)
            .map(|edge| edge.parent.as_str())
    }

    pub fn children(&self, id: &str) -> Vec<&LibraryNode> {
        self.edges
            .values()
            .filter(|edge| edge.parent == id)
            .filter_map(|edge| self.nodes.get(&edge.child))
            .collect()
    }

    /// Recompute the parent/child index from the edges
    pub fn adjacency(&self) -> Adjacency {
        let mut adjacency = Adjacency::default();
        for edge in self.edges.values() {
            adjacency
                .children
                .entry(edge.parent.clone())
                .or_default()
                .push(edge.child.clone());
            adjacency
                .parents
                .entry(edge.child.clone())
                .or_default()
                .push(edge.parent.clone());
        }
        adjacency
    }

    /// Whether any node or connection already uses this diagram element id
    pub fn element_id_in_use(&self, element_id: &str) -> bool {
        self.nodes.values().any(|node| node.element_id == element_id)
            || self.edges.contains_key(element_id)
    }

    /// Time-based library id (`lib_<millis>`), suffixed when already taken
    pub fn unique_library_id(&self, millis: i64) -> String {
        let base = format!("lib_{}", millis);
        unique(base, |candidate| self.nodes.contains_key(candidate))
    }

    /// Element id with the given prefix that no node or edge uses yet
    pub fn unique_element_id(&self, prefix: &str, millis: i64) -> String {
        let base = format!("{}_{}", prefix, millis);
        unique(base, |candidate| self.element_id_in_use(candidate))
    }
}

fn unique(base: String, taken: impl Fn(&str) -> bool) -> String {
    if !taken(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

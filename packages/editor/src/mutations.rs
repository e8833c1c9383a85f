//! # Hierarchy Mutations
//!
//! Reversible edit commands on a [`HierarchyTree`], one per gesture the
//! diagram surface offers.
//!
//! ## Mutation Semantics
//!
//! ### InsertLibrary / RemoveLibrary
//! - Removing a library removes every connection touching it
//! - The framework root can never be removed
//! - Inserting restores position, shape, residue and connections exactly,
//!   which is what makes removal undoable
//!
//! ### Connect / Disconnect / Reconnect
//! - Library to library only, never a library to itself
//! - A second incoming connection is accepted; the validator rejects it
//!   at save time so the user can rewire in any order
//!
//! ### UpdateLibrary
//! - `libraryId` is immutable; only names, framework id and description change
//!
//! Every mutation validates before it touches the tree, so a failed apply
//! leaves the tree unchanged.

use hierarchy_document::{
    Bounds, DiagramShape, EdgeLayout, ElementResidue, HierarchyTree, LibraryNode, ParentEdge,
    Waypoint,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display name given to libraries created from the palette
pub const NEW_LIBRARY_NAME: &str = "New Library";

/// Element id prefixes used for new diagram elements
pub const LIBRARY_ELEMENT_PREFIX: &str = "Activity";
pub const CONNECTION_ELEMENT_PREFIX: &str = "Flow";

/// A library together with everything stored beside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub node: LibraryNode,

    /// Position among the tree's nodes, appended when `None`
    pub index: Option<usize>,
    pub shape: Option<DiagramShape>,
    pub residue: Option<ElementResidue>,
}

/// A connection together with its route and residue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub edge: ParentEdge,
    pub index: Option<usize>,
    pub layout: Option<EdgeLayout>,
    pub residue: Option<ElementResidue>,
}

/// Property changes for one library; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryChanges {
    pub name: Option<String>,
    pub library_name: Option<String>,
    pub framework_id: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

impl LibraryChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.library_name.is_none()
            && self.framework_id.is_none()
            && self.description.is_none()
    }
}

/// Edit commands on a hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert a library, then the given connections in order
    InsertLibrary {
        library: LibrarySnapshot,
        connections: Vec<ConnectionSnapshot>,
    },

    /// Remove a library and every connection touching it
    RemoveLibrary { node_id: String },

    /// Add a parent connection
    Connect { connection: ConnectionSnapshot },

    /// Remove a parent connection
    Disconnect { edge_id: String },

    /// Move either end of a connection
    Reconnect {
        edge_id: String,
        parent: String,
        child: String,
    },

    /// Change display properties of a library
    UpdateLibrary {
        node_id: String,
        changes: LibraryChanges,
    },

    /// Move or resize a library shape; `None` drops the shape
    SetBounds {
        node_id: String,
        bounds: Option<Bounds>,
    },

    /// Reroute a connection
    SetWaypoints {
        edge_id: String,
        waypoints: Vec<Waypoint>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Library already exists: {0}")]
    DuplicateLibrary(String),

    #[error("Diagram element id already in use: {0}")]
    DuplicateElement(String),

    #[error("The framework root library cannot be removed")]
    RootLocked,

    #[error("A library cannot be connected to itself: {0}")]
    SelfConnection(String),

    #[error("Connection {0} has no route")]
    NoRoute(String),
}

impl Mutation {
    /// Palette gesture: a new library named [`NEW_LIBRARY_NAME`] at `(x, y)`
    pub fn create_library(tree: &HierarchyTree, x: f64, y: f64, millis: i64) -> Self {
        let id = tree.unique_library_id(millis);
        let element_id = tree.unique_element_id(LIBRARY_ELEMENT_PREFIX, millis);
        let shape = DiagramShape::for_element(&element_id, Bounds::library_at(x, y));

        Mutation::InsertLibrary {
            library: LibrarySnapshot {
                node: LibraryNode::new(id, element_id, NEW_LIBRARY_NAME),
                index: None,
                shape: Some(shape),
                residue: None,
            },
            connections: Vec::new(),
        }
    }

    /// Connection gesture from `parent` to `child`, routed between their shapes
    pub fn connect(tree: &HierarchyTree, parent: &str, child: &str, millis: i64) -> Self {
        let id = tree.unique_element_id(CONNECTION_ELEMENT_PREFIX, millis);
        let layout = match (tree.layout.shapes.get(parent), tree.layout.shapes.get(child)) {
            (Some(from), Some(to)) => Some(EdgeLayout::between(&id, &from.bounds, &to.bounds)),
            _ => None,
        };

        Mutation::Connect {
            connection: ConnectionSnapshot {
                edge: ParentEdge::new(id, parent, child),
                index: None,
                layout,
                residue: None,
            },
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertLibrary { .. } => "insert-library",
            Mutation::RemoveLibrary { .. } => "remove-library",
            Mutation::Connect { .. } => "connect",
            Mutation::Disconnect { .. } => "disconnect",
            Mutation::Reconnect { .. } => "reconnect",
            Mutation::UpdateLibrary { .. } => "update-library",
            Mutation::SetBounds { .. } => "set-bounds",
            Mutation::SetWaypoints { .. } => "set-waypoints",
        }
    }

    /// Apply mutation to the tree with validation
    pub fn apply(&self, tree: &mut HierarchyTree) -> Result<(), MutationError> {
        self.validate(tree)?;

        match self {
            Mutation::InsertLibrary {
                library,
                connections,
            } => {
                Self::apply_insert(tree, library);
                for connection in connections {
                    Self::apply_connect(tree, connection);
                }
            }

            Mutation::RemoveLibrary { node_id } => Self::apply_remove(tree, node_id),

            Mutation::Connect { connection } => Self::apply_connect(tree, connection),

            Mutation::Disconnect { edge_id } => {
                tree.remove_edge(edge_id);
                tree.layout.edges.shift_remove(edge_id);
                tree.opaque.edge_residues.shift_remove(edge_id);
            }

            Mutation::Reconnect {
                edge_id,
                parent,
                child,
            } => {
                if let Some(edge) = tree.edge_mut(edge_id) {
                    edge.parent = parent.clone();
                    edge.child = child.clone();
                }
            }

            Mutation::UpdateLibrary { node_id, changes } => {
                if let Some(node) = tree.node_mut(node_id) {
                    Self::apply_changes(node, changes);
                }
            }

            Mutation::SetBounds { node_id, bounds } => {
                Self::apply_bounds(tree, node_id, *bounds);
            }

            Mutation::SetWaypoints { edge_id, waypoints } => {
                if let Some(layout) = tree.layout.edges.get_mut(edge_id) {
                    layout.waypoints = waypoints.clone();
                }
            }
        }

        Ok(())
    }

    /// The mutation that undoes `self` on the tree as it is now
    pub fn to_inverse(&self, tree: &HierarchyTree) -> Result<Mutation, MutationError> {
        self.validate(tree)?;

        let inverse = match self {
            Mutation::InsertLibrary { library, .. } => Mutation::RemoveLibrary {
                node_id: library.node.id.clone(),
            },

            Mutation::RemoveLibrary { node_id } => {
                let (index, node) = tree
                    .node_index(node_id)
                    .zip(tree.node(node_id))
                    .ok_or_else(|| MutationError::LibraryNotFound(node_id.clone()))?;

                let connections = tree
                    .incident_edges(node_id)
                    .into_iter()
                    .map(|edge| connection_snapshot(tree, edge))
                    .collect();

                Mutation::InsertLibrary {
                    library: LibrarySnapshot {
                        node: node.clone(),
                        index: Some(index),
                        shape: tree.layout.shapes.get(node_id).cloned(),
                        residue: tree.opaque.residues.get(node_id).cloned(),
                    },
                    connections,
                }
            }

            Mutation::Connect { connection } => Mutation::Disconnect {
                edge_id: connection.edge.id.clone(),
            },

            Mutation::Disconnect { edge_id } => {
                let edge = tree
                    .edge(edge_id)
                    .ok_or_else(|| MutationError::ConnectionNotFound(edge_id.clone()))?;
                Mutation::Connect {
                    connection: connection_snapshot(tree, edge),
                }
            }

            Mutation::Reconnect { edge_id, .. } => {
                let edge = tree
                    .edge(edge_id)
                    .ok_or_else(|| MutationError::ConnectionNotFound(edge_id.clone()))?;
                Mutation::Reconnect {
                    edge_id: edge_id.clone(),
                    parent: edge.parent.clone(),
                    child: edge.child.clone(),
                }
            }

            Mutation::UpdateLibrary { node_id, changes } => {
                let node = tree
                    .node(node_id)
                    .ok_or_else(|| MutationError::LibraryNotFound(node_id.clone()))?;
                let previous = LibraryChanges {
                    name: changes.name.as_ref().map(|_| node.name.clone()),
                    library_name: changes
                        .library_name
                        .as_ref()
                        .map(|_| node.attributes.library_name.clone()),
                    framework_id: changes
                        .framework_id
                        .as_ref()
                        .map(|_| node.attributes.framework_id.clone()),
                    description: changes
                        .description
                        .as_ref()
                        .map(|_| node.attributes.description.clone()),
                };
                Mutation::UpdateLibrary {
                    node_id: node_id.clone(),
                    changes: previous,
                }
            }

            Mutation::SetBounds { node_id, .. } => Mutation::SetBounds {
                node_id: node_id.clone(),
                bounds: tree.layout.shapes.get(node_id).map(|shape| shape.bounds),
            },

            Mutation::SetWaypoints { edge_id, .. } => {
                let layout = tree
                    .layout
                    .edges
                    .get(edge_id)
                    .ok_or_else(|| MutationError::NoRoute(edge_id.clone()))?;
                Mutation::SetWaypoints {
                    edge_id: edge_id.clone(),
                    waypoints: layout.waypoints.clone(),
                }
            }
        };

        Ok(inverse)
    }

    /// Validate without applying
    pub fn validate(&self, tree: &HierarchyTree) -> Result<(), MutationError> {
        match self {
            Mutation::InsertLibrary {
                library,
                connections,
            } => {
                let node = &library.node;
                if tree.contains(&node.id) {
                    return Err(MutationError::DuplicateLibrary(node.id.clone()));
                }
                if tree.element_id_in_use(&node.element_id) {
                    return Err(MutationError::DuplicateElement(node.element_id.clone()));
                }

                for connection in connections {
                    let edge = &connection.edge;
                    if edge.id == node.element_id
                        || tree.element_id_in_use(&edge.id)
                        || connections.iter().filter(|c| c.edge.id == edge.id).count() > 1
                    {
                        return Err(MutationError::DuplicateElement(edge.id.clone()));
                    }
                    check_endpoints(tree, edge, Some(&node.id))?;
                }
                Ok(())
            }

            Mutation::RemoveLibrary { node_id } => {
                let node = tree
                    .node(node_id)
                    .ok_or_else(|| MutationError::LibraryNotFound(node_id.clone()))?;
                if node.is_root() {
                    return Err(MutationError::RootLocked);
                }
                Ok(())
            }

            Mutation::Connect { connection } => {
                let edge = &connection.edge;
                if tree.element_id_in_use(&edge.id) {
                    return Err(MutationError::DuplicateElement(edge.id.clone()));
                }
                check_endpoints(tree, edge, None)
            }

            Mutation::Disconnect { edge_id } => {
                tree.edge(edge_id)
                    .ok_or_else(|| MutationError::ConnectionNotFound(edge_id.clone()))?;
                Ok(())
            }

            Mutation::Reconnect {
                edge_id,
                parent,
                child,
            } => {
                tree.edge(edge_id)
                    .ok_or_else(|| MutationError::ConnectionNotFound(edge_id.clone()))?;
                check_endpoints(tree, &ParentEdge::new(edge_id, parent, child), None)
            }

            Mutation::UpdateLibrary { node_id, .. } | Mutation::SetBounds { node_id, .. } => {
                tree.node(node_id)
                    .ok_or_else(|| MutationError::LibraryNotFound(node_id.clone()))?;
                Ok(())
            }

            Mutation::SetWaypoints { edge_id, .. } => {
                tree.edge(edge_id)
                    .ok_or_else(|| MutationError::ConnectionNotFound(edge_id.clone()))?;
                if !tree.layout.edges.contains_key(edge_id) {
                    return Err(MutationError::NoRoute(edge_id.clone()));
                }
                Ok(())
            }
        }
    }

    fn apply_insert(tree: &mut HierarchyTree, library: &LibrarySnapshot) {
        let id = library.node.id.clone();
        tree.insert_node(library.node.clone(), library.index);
        if let Some(shape) = &library.shape {
            tree.layout.shapes.insert(id.clone(), shape.clone());
        }
        if let Some(residue) = &library.residue {
            tree.opaque.residues.insert(id, residue.clone());
        }
    }

    fn apply_connect(tree: &mut HierarchyTree, connection: &ConnectionSnapshot) {
        let id = connection.edge.id.clone();
        tree.insert_edge(connection.edge.clone(), connection.index);
        if let Some(layout) = &connection.layout {
            tree.layout.edges.insert(id.clone(), layout.clone());
        }
        if let Some(residue) = &connection.residue {
            tree.opaque.edge_residues.insert(id, residue.clone());
        }
    }

    fn apply_remove(tree: &mut HierarchyTree, node_id: &str) {
        let incident: Vec<String> = tree
            .incident_edges(node_id)
            .into_iter()
            .map(|edge| edge.id.clone())
            .collect();

        for edge_id in incident {
            tree.remove_edge(&edge_id);
            tree.layout.edges.shift_remove(&edge_id);
            tree.opaque.edge_residues.shift_remove(&edge_id);
        }

        tree.layout.shapes.shift_remove(node_id);
        tree.opaque.residues.shift_remove(node_id);
        tree.remove_node(node_id);
    }

    fn apply_changes(node: &mut LibraryNode, changes: &LibraryChanges) {
        if let Some(name) = &changes.name {
            node.name = name.clone();
        }
        if let Some(library_name) = &changes.library_name {
            node.attributes.library_name = library_name.clone();
        }
        if let Some(framework_id) = &changes.framework_id {
            node.attributes.framework_id = framework_id.clone();
        }
        if let Some(description) = &changes.description {
            node.attributes.description = description.clone();
        }
    }

    fn apply_bounds(tree: &mut HierarchyTree, node_id: &str, bounds: Option<Bounds>) {
        let Some(bounds) = bounds else {
            tree.layout.shapes.shift_remove(node_id);
            return;
        };

        if let Some(shape) = tree.layout.shapes.get_mut(node_id) {
            shape.bounds = bounds;
        } else if let Some(node) = tree.node(node_id) {
            let shape = DiagramShape::for_element(&node.element_id, bounds);
            tree.layout.shapes.insert(node_id.to_string(), shape);
        }
    }
}

/// Both ends must be libraries, and different ones. `pending` names a
/// library that is about to be inserted alongside the connection.
fn check_endpoints(
    tree: &HierarchyTree,
    edge: &ParentEdge,
    pending: Option<&str>,
) -> Result<(), MutationError> {
    for end in [&edge.parent, &edge.child] {
        if !tree.contains(end) && pending != Some(end.as_str()) {
            return Err(MutationError::LibraryNotFound(end.clone()));
        }
    }
    if edge.parent == edge.child {
        return Err(MutationError::SelfConnection(edge.parent.clone()));
    }
    Ok(())
}

fn connection_snapshot(tree: &HierarchyTree, edge: &ParentEdge) -> ConnectionSnapshot {
    ConnectionSnapshot {
        edge: edge.clone(),
        index: tree.edge_index(&edge.id),
        layout: tree.layout.edges.get(&edge.id).cloned(),
        residue: tree.opaque.edge_residues.get(&edge.id).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hierarchy_document::{decode, default_tree, ROOT_LIBRARY_ID};

    fn two_levels() -> HierarchyTree {
        let mut tree = default_tree("Root");
        let mut edit = |mutation: Mutation| mutation.apply(&mut tree).unwrap();
        edit(Mutation::InsertLibrary {
            library: LibrarySnapshot {
                node: LibraryNode::new("a", "Activity_a", "A").with_framework_id("fw-1"),
                index: None,
                shape: Some(DiagramShape::for_element("Activity_a", Bounds::library_at(0.0, 200.0))),
                residue: None,
            },
            connections: vec![ConnectionSnapshot {
                edge: ParentEdge::new("Flow_a", ROOT_LIBRARY_ID, "a"),
                index: None,
                layout: None,
                residue: None,
            }],
        });
        edit(Mutation::InsertLibrary {
            library: LibrarySnapshot {
                node: LibraryNode::new("b", "Activity_b", "B"),
                index: None,
                shape: None,
                residue: None,
            },
            connections: vec![ConnectionSnapshot {
                edge: ParentEdge::new("Flow_b", "a", "b"),
                index: None,
                layout: None,
                residue: None,
            }],
        });
        tree
    }

    fn undoable(tree: &mut HierarchyTree, mutation: Mutation) {
        let before = tree.clone();
        let inverse = mutation.to_inverse(tree).unwrap();
        mutation.apply(tree).unwrap();
        assert_ne!(*tree, before, "{} changed nothing", mutation.name());
        inverse.apply(tree).unwrap();
        assert_eq!(*tree, before, "{} did not invert", mutation.name());
    }

    #[test]
    fn test_mutation_serialization() {
        let mutation = Mutation::UpdateLibrary {
            node_id: "a".to_string(),
            changes: LibraryChanges {
                name: Some("Renamed".to_string()),
                description: Some(None),
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&mutation).unwrap();
        let deserialized: Mutation = serde_json::from_str(&json).unwrap();

        assert_eq!(mutation, deserialized);
    }

    #[test]
    fn test_create_library_uses_palette_defaults() {
        let mut tree = default_tree("Root");
        let mutation = Mutation::create_library(&tree, 10.0, 20.0, 1700000000000);
        mutation.apply(&mut tree).unwrap();

        let node = tree.node("lib_1700000000000").unwrap();
        assert_eq!(node.name, NEW_LIBRARY_NAME);
        assert_eq!(node.attributes.library_name, NEW_LIBRARY_NAME);
        assert_eq!(node.element_id, "Activity_1700000000000");

        let shape = &tree.layout.shapes["lib_1700000000000"];
        assert_eq!(shape.bounds, Bounds::new(10.0, 20.0, 260.0, 60.0));
    }

    #[test]
    fn test_create_library_twice_in_one_millisecond() {
        let mut tree = default_tree("Root");
        Mutation::create_library(&tree, 0.0, 0.0, 5).apply(&mut tree).unwrap();
        Mutation::create_library(&tree, 0.0, 0.0, 5).apply(&mut tree).unwrap();
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut tree = two_levels();
        let err = Mutation::RemoveLibrary {
            node_id: ROOT_LIBRARY_ID.to_string(),
        }
        .apply(&mut tree)
        .unwrap_err();
        assert_eq!(err, MutationError::RootLocked);
        assert!(tree.root().is_some());
    }

    #[test]
    fn test_remove_library_drops_incident_connections() {
        let mut tree = two_levels();
        Mutation::RemoveLibrary {
            node_id: "a".to_string(),
        }
        .apply(&mut tree)
        .unwrap();

        assert!(!tree.contains("a"));
        assert_eq!(tree.edge_count(), 0);
        assert!(!tree.layout.shapes.contains_key("a"));
        assert!(tree.contains("b"));
    }

    #[test]
    fn test_self_connection_is_rejected() {
        let mut tree = two_levels();
        let err = Mutation::connect(&tree, "a", "a", 1).apply(&mut tree).unwrap_err();
        assert_eq!(err, MutationError::SelfConnection("a".to_string()));
    }

    #[test]
    fn test_connect_to_unknown_library_is_rejected() {
        let mut tree = two_levels();
        let before = tree.clone();
        let err = Mutation::connect(&tree, "a", "ghost", 1).apply(&mut tree).unwrap_err();
        assert_eq!(err, MutationError::LibraryNotFound("ghost".to_string()));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_second_parent_is_accepted_while_editing() {
        let mut tree = two_levels();
        Mutation::connect(&tree, ROOT_LIBRARY_ID, "b", 1).apply(&mut tree).unwrap();
        assert_eq!(tree.parent_ids("b"), vec!["a", ROOT_LIBRARY_ID]);
    }

    #[test]
    fn test_connect_routes_between_shapes() {
        let tree = two_levels();
        let Mutation::Connect { connection } = Mutation::connect(&tree, ROOT_LIBRARY_ID, "a", 9) else {
            panic!("expected a connection");
        };
        assert_eq!(connection.edge.id, "Flow_9");
        assert_eq!(connection.layout.unwrap().waypoints.len(), 2);
    }

    #[test]
    fn test_library_id_survives_property_update() {
        let mut tree = two_levels();
        Mutation::UpdateLibrary {
            node_id: "a".to_string(),
            changes: LibraryChanges {
                name: Some("Core".to_string()),
                library_name: Some("Core".to_string()),
                framework_id: Some(None),
                description: Some(Some("shared".to_string())),
            },
        }
        .apply(&mut tree)
        .unwrap();

        let node = tree.node("a").unwrap();
        assert_eq!(node.attributes.library_id, "a");
        assert_eq!(node.name, "Core");
        assert_eq!(node.attributes.framework_id, None);
        assert_eq!(node.attributes.description.as_deref(), Some("shared"));
    }

    #[test]
    fn test_every_mutation_inverts() {
        let mut tree = two_levels();

        let create = Mutation::create_library(&tree, 5.0, 5.0, 42);
        undoable(&mut tree, create);
        undoable(
            &mut tree,
            Mutation::RemoveLibrary {
                node_id: "a".to_string(),
            },
        );
        let connect = Mutation::connect(&tree, ROOT_LIBRARY_ID, "b", 7);
        undoable(&mut tree, connect);
        undoable(
            &mut tree,
            Mutation::Disconnect {
                edge_id: "Flow_b".to_string(),
            },
        );
        undoable(
            &mut tree,
            Mutation::Reconnect {
                edge_id: "Flow_b".to_string(),
                parent: ROOT_LIBRARY_ID.to_string(),
                child: "b".to_string(),
            },
        );
        undoable(
            &mut tree,
            Mutation::UpdateLibrary {
                node_id: "b".to_string(),
                changes: LibraryChanges {
                    name: Some("Beta".to_string()),
                    framework_id: Some(Some("fw-2".to_string())),
                    ..Default::default()
                },
            },
        );
        undoable(
            &mut tree,
            Mutation::SetBounds {
                node_id: "a".to_string(),
                bounds: Some(Bounds::library_at(300.0, 300.0)),
            },
        );
        undoable(
            &mut tree,
            Mutation::SetBounds {
                node_id: "b".to_string(),
                bounds: Some(Bounds::library_at(1.0, 1.0)),
            },
        );
    }

    #[test]
    fn test_removal_undo_restores_document_order() {
        let mut tree = decode(
            include_str!("../tests/fixtures/three_levels.bpmn"),
            "Root",
        )
        .unwrap();
        let before = hierarchy_document::encode(&tree).unwrap();

        let removal = Mutation::RemoveLibrary {
            node_id: "lib_core".to_string(),
        };
        let inverse = removal.to_inverse(&tree).unwrap();
        removal.apply(&mut tree).unwrap();
        inverse.apply(&mut tree).unwrap();

        assert_eq!(hierarchy_document::encode(&tree).unwrap(), before);
    }
}

//! # Hierarchy Codec
//!
//! Converts between a library hierarchy document and [`HierarchyTree`].
//!
//! ## Document shape
//!
//! ```text
//! bpmn:definitions
//! ├── bpmn:process
//! │   ├── bpmn:subProcess   one per library (library:* attributes)
//! │   └── bpmn:sequenceFlow one per parent edge (sourceRef = parent)
//! └── bpmndi:BPMNDiagram
//!     └── bpmndi:BPMNPlane
//!         ├── bpmndi:BPMNShape  library bounds
//!         └── bpmndi:BPMNEdge   connection waypoints
//! ```
//!
//! `bpmn:incoming` / `bpmn:outgoing` children are derived from the edges on
//! encode and ignored on decode. Anything else is kept in
//! [`OpaqueContent`](crate::model::OpaqueContent) and written back as-is.

use crate::error::{DocumentError, DocumentResult};
use crate::model::{
    Bounds, DiagramShape, EdgeLayout, ElementResidue, HierarchyTree, LibraryAttributes,
    LibraryNode, ParentEdge, Waypoint, ROOT_ELEMENT_ID, ROOT_LIBRARY_ID,
};
use crate::xml::{self, local_name, Attributes, XmlElement, XmlNode};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
pub const DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const LIBRARY_NS: &str = "http://lowcodelabs/schema/library";

/// Position of the synthesized root shape
const ROOT_X: f64 = 200.0;
const ROOT_Y: f64 = 100.0;

const DEFINITIONS_DEFAULTS: [(&str, &str); 8] = [
    ("xmlns:xsi", XSI_NS),
    ("xmlns:bpmn", BPMN_NS),
    ("xmlns:bpmndi", BPMNDI_NS),
    ("xmlns:di", DI_NS),
    ("xmlns:dc", DC_NS),
    ("xmlns:library", LIBRARY_NS),
    ("id", "Definitions_1"),
    ("targetNamespace", "http://bpmn.io/schema/bpmn"),
];
const PROCESS_DEFAULTS: [(&str, &str); 2] = [("id", "Process_1"), ("isExecutable", "false")];
const DIAGRAM_DEFAULTS: [(&str, &str); 1] = [("id", "BPMNDiagram_1")];
const PLANE_DEFAULTS: [(&str, &str); 1] = [("id", "BPMNPlane_1")];

/// Attributes of a library element that the codec interprets
const LIBRARY_KEYS: [&str; 6] = [
    "id",
    "name",
    "libraryId",
    "libraryName",
    "frameworkId",
    "description",
];
const CONNECTION_KEYS: [&str; 3] = ["id", "sourceRef", "targetRef"];
const DIAGRAM_ELEMENT_KEYS: [&str; 2] = ["id", "bpmnElement"];

/// Tree holding only the framework root, named `root_name`
pub fn default_tree(root_name: &str) -> HierarchyTree {
    let mut tree = HierarchyTree::new();
    insert_root(&mut tree, root_name);
    normalize(&mut tree);
    tree
}

/// Decode a document.
///
/// An empty document yields [`default_tree`]. A document without a root
/// library keeps its libraries and gains a synthesized root named
/// `default_root_name`.
pub fn decode(document: &str, default_root_name: &str) -> DocumentResult<HierarchyTree> {
    if document.trim().is_empty() {
        debug!("Empty document, synthesizing default hierarchy");
        return Ok(default_tree(default_root_name));
    }

    let root = xml::parse(document)?;
    if root.local_name() != "definitions" {
        return Err(DocumentError::unexpected_root(root.name));
    }

    let mut tree = HierarchyTree::new();
    tree.opaque.definitions = root.attributes.clone();

    let mut process = None;
    let mut diagram = None;
    for child in root.elements() {
        match child.local_name() {
            "process" if process.is_none() => process = Some(child),
            "BPMNDiagram" if diagram.is_none() => diagram = Some(child),
            _ => tree.opaque.definitions_children.push(child.clone()),
        }
    }

    // element id -> node id
    let mut libraries: HashMap<String, String> = HashMap::new();

    if let Some(process) = process {
        tree.opaque.process = process.attributes.clone();
        read_process(process, &mut tree, &mut libraries)?;
    }

    if let Some(diagram) = diagram {
        tree.opaque.diagram = diagram.attributes.clone();
        let mut plane_seen = false;
        for child in diagram.elements() {
            if child.local_name() == "BPMNPlane" && !plane_seen {
                plane_seen = true;
                tree.opaque.plane = child.attributes.clone();
                read_plane(child, &mut tree, &libraries)?;
            } else {
                tree.opaque.diagram_children.push(child.clone());
            }
        }
    }

    if tree.root().is_none() {
        warn!(
            libraries = tree.len(),
            "Document has no root library, synthesizing '{}'", default_root_name
        );
        insert_root(&mut tree, default_root_name);
    }

    normalize(&mut tree);
    debug!(
        libraries = tree.len(),
        connections = tree.edge_count(),
        "Decoded library hierarchy"
    );
    Ok(tree)
}

/// Encode a tree as an indented document
pub fn encode(tree: &HierarchyTree) -> DocumentResult<String> {
    xml::write(&to_xml(tree))
}

/// Build the document element tree for `tree`
pub fn to_xml(tree: &HierarchyTree) -> XmlElement {
    let opaque = &tree.opaque;

    let mut process = XmlElement::new("bpmn:process");
    process.attributes = with_defaults(&opaque.process, &PROCESS_DEFAULTS);
    let process_id = process.attribute("id").unwrap_or("Process_1").to_string();

    for node in tree.nodes() {
        process.push_child(library_element(tree, node));
    }
    for edge in tree.edges() {
        process.push_child(connection_element(tree, edge));
    }
    process
        .children
        .extend(opaque.process_children.iter().cloned().map(XmlNode::Element));

    let mut plane = XmlElement::new("bpmndi:BPMNPlane");
    plane.attributes = plane_attributes(&opaque.plane, &process_id);
    for node in tree.nodes() {
        if let Some(shape) = tree.layout.shapes.get(&node.id) {
            plane.push_child(shape_element(node, shape));
        }
    }
    for edge in tree.edges() {
        if let Some(layout) = tree.layout.edges.get(&edge.id) {
            plane.push_child(edge_element(edge, layout));
        }
    }
    plane
        .children
        .extend(opaque.plane_children.iter().cloned().map(XmlNode::Element));

    let mut diagram = XmlElement::new("bpmndi:BPMNDiagram");
    diagram.attributes = with_defaults(&opaque.diagram, &DIAGRAM_DEFAULTS);
    diagram.push_child(plane);
    diagram
        .children
        .extend(opaque.diagram_children.iter().cloned().map(XmlNode::Element));

    let mut definitions = XmlElement::new("bpmn:definitions");
    definitions.attributes = with_defaults(&opaque.definitions, &DEFINITIONS_DEFAULTS);
    definitions.push_child(process);
    definitions.children.extend(
        opaque
            .definitions_children
            .iter()
            .cloned()
            .map(XmlNode::Element),
    );
    definitions.push_child(diagram);
    definitions
}

fn read_process(
    process: &XmlElement,
    tree: &mut HierarchyTree,
    libraries: &mut HashMap<String, String>,
) -> DocumentResult<()> {
    let mut flows = Vec::new();

    for child in process.elements() {
        match child.local_name() {
            "subProcess" if child.attribute("libraryId").is_some() => {
                let (node, residue) = read_library(child)?;
                if tree.contains(&node.id) {
                    return Err(DocumentError::DuplicateLibrary {
                        library_id: node.id,
                    });
                }
                libraries.insert(node.element_id.clone(), node.id.clone());
                if !residue.is_empty() {
                    tree.opaque.residues.insert(node.id.clone(), residue);
                }
                tree.insert_node(node, None);
            }
            "sequenceFlow" => flows.push(child),
            _ => tree.opaque.process_children.push(child.clone()),
        }
    }

    // Connections are resolved once every library element is known.
    for flow in flows {
        match read_connection(flow, libraries) {
            Some((edge, residue)) if tree.edge(&edge.id).is_none() => {
                if !residue.is_empty() {
                    tree.opaque.edge_residues.insert(edge.id.clone(), residue);
                }
                tree.insert_edge(edge, None);
            }
            _ => tree.opaque.process_children.push(flow.clone()),
        }
    }

    Ok(())
}

fn read_library(element: &XmlElement) -> DocumentResult<(LibraryNode, ElementResidue)> {
    let library_id = element.attribute("libraryId").unwrap_or_default().to_string();
    let element_id = element.attribute("id").ok_or_else(|| {
        DocumentError::malformed(0, format!("library '{}' has no element id", library_id))
    })?;

    let library_name = element
        .attribute("libraryName")
        .or_else(|| element.attribute("name"))
        .unwrap_or_default()
        .to_string();
    let name = element
        .attribute("name")
        .map(str::to_string)
        .unwrap_or_else(|| library_name.clone());

    let node = LibraryNode {
        id: library_id.clone(),
        name,
        attributes: LibraryAttributes {
            library_id,
            library_name,
            framework_id: element.attribute("frameworkId").map(str::to_string),
            description: element.attribute("description").map(str::to_string),
        },
        element_id: element_id.to_string(),
    };

    let residue = ElementResidue {
        attributes: unknown_attributes(&element.attributes, &LIBRARY_KEYS),
        children: element
            .children
            .iter()
            .filter(|child| match child {
                XmlNode::Element(inner) => {
                    !matches!(inner.local_name(), "incoming" | "outgoing")
                }
                XmlNode::Text(_) => true,
            })
            .cloned()
            .collect(),
    };

    Ok((node, residue))
}

fn read_connection(
    flow: &XmlElement,
    libraries: &HashMap<String, String>,
) -> Option<(ParentEdge, ElementResidue)> {
    let id = flow.attribute("id")?;
    let parent = libraries.get(flow.attribute("sourceRef")?)?;
    let child = libraries.get(flow.attribute("targetRef")?)?;

    let residue = ElementResidue {
        attributes: unknown_attributes(&flow.attributes, &CONNECTION_KEYS),
        children: flow.children.clone(),
    };
    Some((ParentEdge::new(id, parent.as_str(), child.as_str()), residue))
}

fn read_plane(
    plane: &XmlElement,
    tree: &mut HierarchyTree,
    libraries: &HashMap<String, String>,
) -> DocumentResult<()> {
    for child in plane.elements() {
        let target = child.attribute("bpmnElement").unwrap_or_default();
        match child.local_name() {
            "BPMNShape" => {
                let node_id = libraries
                    .get(target)
                    .filter(|node_id| !tree.layout.shapes.contains_key(node_id.as_str()));
                match (node_id, child.child("Bounds")) {
                    (Some(node_id), Some(bounds)) => {
                        let shape = DiagramShape {
                            shape_id: child.attribute("id").unwrap_or_default().to_string(),
                            bounds: read_bounds(bounds)?,
                            attributes: unknown_attributes(&child.attributes, &DIAGRAM_ELEMENT_KEYS),
                            children: child
                                .elements()
                                .filter(|inner| inner.local_name() != "Bounds")
                                .cloned()
                                .collect(),
                        };
                        tree.layout.shapes.insert(node_id.clone(), shape);
                    }
                    _ => tree.opaque.plane_children.push(child.clone()),
                }
            }
            "BPMNEdge"
                if tree.edge(target).is_some() && !tree.layout.edges.contains_key(target) =>
            {
                let mut waypoints = Vec::new();
                let mut extra = Vec::new();
                for inner in child.elements() {
                    if inner.local_name() == "waypoint" {
                        waypoints.push(Waypoint {
                            x: read_number(inner, "x")?,
                            y: read_number(inner, "y")?,
                        });
                    } else {
                        extra.push(inner.clone());
                    }
                }
                let layout = EdgeLayout {
                    edge_id: child.attribute("id").unwrap_or_default().to_string(),
                    waypoints,
                    attributes: unknown_attributes(&child.attributes, &DIAGRAM_ELEMENT_KEYS),
                    children: extra,
                };
                tree.layout.edges.insert(target.to_string(), layout);
            }
            _ => tree.opaque.plane_children.push(child.clone()),
        }
    }
    Ok(())
}

fn read_bounds(element: &XmlElement) -> DocumentResult<Bounds> {
    Ok(Bounds {
        x: read_number(element, "x")?,
        y: read_number(element, "y")?,
        width: read_number(element, "width")?,
        height: read_number(element, "height")?,
    })
}

fn read_number(element: &XmlElement, key: &str) -> DocumentResult<f64> {
    let raw = element.attribute(key).ok_or_else(|| {
        DocumentError::malformed(0, format!("'{}' is missing attribute '{}'", element.name, key))
    })?;
    raw.trim().parse().map_err(|_| {
        DocumentError::malformed(
            0,
            format!("'{}' has non-numeric {}=\"{}\"", element.name, key, raw),
        )
    })
}

fn library_element(tree: &HierarchyTree, node: &LibraryNode) -> XmlElement {
    let mut element = XmlElement::new("bpmn:subProcess")
        .with_attribute("id", &node.element_id)
        .with_attribute("name", &node.name)
        .with_attribute("library:libraryId", &node.attributes.library_id)
        .with_attribute("library:libraryName", &node.attributes.library_name);
    if let Some(framework_id) = &node.attributes.framework_id {
        element.push_attribute("library:frameworkId", framework_id);
    }
    if let Some(description) = &node.attributes.description {
        element.push_attribute("library:description", description);
    }

    let residue = tree.opaque.residues.get(&node.id);
    if let Some(residue) = residue {
        element.attributes.extend(residue.attributes.iter().cloned());
    }

    for edge in tree.edges().filter(|edge| edge.child == node.id) {
        let mut incoming = XmlElement::new("bpmn:incoming");
        incoming.push_text(&edge.id);
        element.push_child(incoming);
    }
    for edge in tree.edges().filter(|edge| edge.parent == node.id) {
        let mut outgoing = XmlElement::new("bpmn:outgoing");
        outgoing.push_text(&edge.id);
        element.push_child(outgoing);
    }

    if let Some(residue) = residue {
        element.children.extend(residue.children.iter().cloned());
    }
    element
}

fn connection_element(tree: &HierarchyTree, edge: &ParentEdge) -> XmlElement {
    let element_of = |node_id: &str| {
        tree.node(node_id)
            .map(|node| node.element_id.clone())
            .unwrap_or_else(|| node_id.to_string())
    };

    let mut element = XmlElement::new("bpmn:sequenceFlow")
        .with_attribute("id", &edge.id)
        .with_attribute("sourceRef", element_of(&edge.parent))
        .with_attribute("targetRef", element_of(&edge.child));
    if let Some(residue) = tree.opaque.edge_residues.get(&edge.id) {
        element.attributes.extend(residue.attributes.iter().cloned());
        element.children.extend(residue.children.iter().cloned());
    }
    element
}

fn shape_element(node: &LibraryNode, shape: &DiagramShape) -> XmlElement {
    let mut element = XmlElement::new("bpmndi:BPMNShape")
        .with_attribute("id", &shape.shape_id)
        .with_attribute("bpmnElement", &node.element_id);
    element.attributes.extend(shape.attributes.iter().cloned());

    element.push_child(
        XmlElement::new("dc:Bounds")
            .with_attribute("x", number(shape.bounds.x))
            .with_attribute("y", number(shape.bounds.y))
            .with_attribute("width", number(shape.bounds.width))
            .with_attribute("height", number(shape.bounds.height)),
    );
    element
        .children
        .extend(shape.children.iter().cloned().map(XmlNode::Element));
    element
}

fn edge_element(edge: &ParentEdge, layout: &EdgeLayout) -> XmlElement {
    let mut element = XmlElement::new("bpmndi:BPMNEdge")
        .with_attribute("id", &layout.edge_id)
        .with_attribute("bpmnElement", &edge.id);
    element.attributes.extend(layout.attributes.iter().cloned());

    for waypoint in &layout.waypoints {
        element.push_child(
            XmlElement::new("di:waypoint")
                .with_attribute("x", number(waypoint.x))
                .with_attribute("y", number(waypoint.y)),
        );
    }
    element
        .children
        .extend(layout.children.iter().cloned().map(XmlNode::Element));
    element
}

fn insert_root(tree: &mut HierarchyTree, name: &str) {
    tree.insert_node(LibraryNode::root(name), Some(0));
    tree.layout.shapes.insert(
        ROOT_LIBRARY_ID.to_string(),
        DiagramShape::for_element(ROOT_ELEMENT_ID, Bounds::library_at(ROOT_X, ROOT_Y)),
    );
}

/// Fill in required container attributes so encode and decode agree on them
fn normalize(tree: &mut HierarchyTree) {
    let opaque = &mut tree.opaque;
    opaque.definitions = with_defaults(&opaque.definitions, &DEFINITIONS_DEFAULTS);
    opaque.process = with_defaults(&opaque.process, &PROCESS_DEFAULTS);
    opaque.diagram = with_defaults(&opaque.diagram, &DIAGRAM_DEFAULTS);

    let process_id = opaque
        .process
        .iter()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "Process_1".to_string());
    opaque.plane = plane_attributes(&opaque.plane, &process_id);
}

fn plane_attributes(attributes: &Attributes, process_id: &str) -> Attributes {
    let mut attributes = with_defaults(attributes, &PLANE_DEFAULTS);
    if !attributes.iter().any(|(key, _)| key == "bpmnElement") {
        attributes.push(("bpmnElement".to_string(), process_id.to_string()));
    }
    attributes
}

fn with_defaults(attributes: &Attributes, defaults: &[(&str, &str)]) -> Attributes {
    let mut merged = attributes.clone();
    for (key, value) in defaults {
        if !merged.iter().any(|(existing, _)| existing == key) {
            merged.push((key.to_string(), value.to_string()));
        }
    }
    merged
}

fn unknown_attributes(attributes: &Attributes, known: &[&str]) -> Attributes {
    attributes
        .iter()
        .filter(|(key, _)| key.starts_with("xmlns") || !known.contains(&local_name(key)))
        .cloned()
        .collect()
}

fn number(value: f64) -> String {
    format!("{}", value)
}

//! Property tests for the hierarchy codec
//!
//! Trees are generated with at most one parent edge per library, the shape
//! every saved document has.

use hierarchy_document::{
    decode, default_tree, encode, validate, Bounds, DiagramShape, EdgeLayout, HierarchyTree,
    LibraryNode, ParentEdge, Waypoint, DEFAULT_ROOT_NAME, ROOT_LIBRARY_ID,
};
use proptest::prelude::*;
use proptest::sample::Index;

#[derive(Debug, Clone)]
struct LibrarySpec {
    name: String,
    framework_id: Option<String>,
    description: Option<String>,
    position: Option<(f64, f64)>,
    parent: Option<Index>,
    routed: bool,
}

fn text() -> impl Strategy<Value = String> {
    r#"[A-Za-z0-9 _&<>'"-]{0,16}"#
}

fn coordinate() -> impl Strategy<Value = f64> {
    (-2000i32..2000).prop_map(|v| f64::from(v) / 2.0)
}

fn library() -> impl Strategy<Value = LibrarySpec> {
    (
        text(),
        proptest::option::of(text()),
        proptest::option::of(text()),
        proptest::option::of((coordinate(), coordinate())),
        any::<Option<Index>>(),
        any::<bool>(),
    )
        .prop_map(
            |(name, framework_id, description, position, parent, routed)| LibrarySpec {
                name,
                framework_id,
                description,
                position,
                parent,
                routed,
            },
        )
}

fn build(root_name: &str, specs: &[LibrarySpec]) -> HierarchyTree {
    let mut tree = default_tree(root_name);
    let mut ids = vec![ROOT_LIBRARY_ID.to_string()];

    for (i, spec) in specs.iter().enumerate() {
        let id = format!("lib_{}", i);
        let element_id = format!("Activity_{}", i);

        let mut node = LibraryNode::new(&id, &element_id, &spec.name);
        node.attributes.framework_id = spec.framework_id.clone();
        node.attributes.description = spec.description.clone();
        tree.insert_node(node, None);

        if let Some((x, y)) = spec.position {
            tree.layout.shapes.insert(
                id.clone(),
                DiagramShape::for_element(&element_id, Bounds::library_at(x, y)),
            );
        }

        if let Some(parent) = &spec.parent {
            let edge_id = format!("Flow_{}", i);
            tree.insert_edge(ParentEdge::new(&edge_id, parent.get(&ids).as_str(), &id), None);
            if spec.routed {
                tree.layout.edges.insert(
                    edge_id.clone(),
                    EdgeLayout::new(
                        format!("{}_di", edge_id),
                        vec![Waypoint { x: 1.5, y: 2.0 }, Waypoint { x: 3.0, y: -4.5 }],
                    ),
                );
            }
        }

        ids.push(id);
    }

    tree
}

proptest! {
    #[test]
    fn decode_inverts_encode(root_name in text(), specs in prop::collection::vec(library(), 0..10)) {
        let tree = build(&root_name, &specs);
        let encoded = encode(&tree).unwrap();
        let decoded = decode(&encoded, DEFAULT_ROOT_NAME).unwrap();
        prop_assert_eq!(decoded, tree);
    }

    #[test]
    fn encoding_is_stable(specs in prop::collection::vec(library(), 0..10)) {
        let tree = build("Root", &specs);
        let first = encode(&tree).unwrap();
        let second = encode(&decode(&first, DEFAULT_ROOT_NAME).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn single_parent_trees_are_valid(specs in prop::collection::vec(library(), 0..10)) {
        let tree = build("Root", &specs);
        prop_assert!(validate(&tree).is_valid());
    }
}

#[test]
fn test_node_order_follows_insertion() {
    let specs: Vec<LibrarySpec> = (0..4)
        .map(|i| LibrarySpec {
            name: format!("Library {}", i),
            framework_id: None,
            description: None,
            position: Some((0.0, f64::from(i) * 100.0)),
            parent: None,
            routed: false,
        })
        .collect();
    let tree = build("Root", &specs);

    let encoded = encode(&tree).unwrap();
    let positions: Vec<usize> = ["SubProcess_Root", "Activity_0", "Activity_1", "Activity_2", "Activity_3"]
        .iter()
        .map(|id| encoded.find(&format!("<bpmn:subProcess id=\"{}\"", id)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

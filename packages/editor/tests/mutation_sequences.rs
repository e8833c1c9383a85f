//! Tests for long mutation sequences
//!
//! This tests:
//! - Random edit chains fully undone restore the starting tree
//! - Redo after undo replays to the same tree
//! - Document integrity after remove/undo chains

use hierarchy_document::{decode, encode, validate, Bounds, HierarchyTree, DEFAULT_ROOT_NAME};
use hierarchy_editor::{ChangeTracker, LibraryChanges, Mutation};
use proptest::prelude::*;
use proptest::sample::Index;

const THREE_LEVELS: &str = include_str!("fixtures/three_levels.bpmn");

#[derive(Debug, Clone)]
enum Edit {
    Create { x: i16, y: i16 },
    Remove(Index),
    Connect(Index, Index),
    Disconnect(Index),
    Reconnect(Index, Index, Index),
    Rename(Index, String),
    Move(Index, i16, i16),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<i16>(), any::<i16>()).prop_map(|(x, y)| Edit::Create { x, y }),
        any::<Index>().prop_map(Edit::Remove),
        (any::<Index>(), any::<Index>()).prop_map(|(a, b)| Edit::Connect(a, b)),
        any::<Index>().prop_map(Edit::Disconnect),
        (any::<Index>(), any::<Index>(), any::<Index>()).prop_map(|(e, a, b)| Edit::Reconnect(e, a, b)),
        (any::<Index>(), "[A-Za-z ]{0,12}").prop_map(|(i, name)| Edit::Rename(i, name)),
        (any::<Index>(), any::<i16>(), any::<i16>()).prop_map(|(i, x, y)| Edit::Move(i, x, y)),
    ]
}

/// Turn an abstract edit into a mutation against the tree as it is now
fn to_mutation(tree: &HierarchyTree, edit: &Edit, millis: i64) -> Option<Mutation> {
    let nodes: Vec<String> = tree.nodes().map(|node| node.id.clone()).collect();
    let edges: Vec<String> = tree.edges().map(|edge| edge.id.clone()).collect();

    let mutation = match edit {
        Edit::Create { x, y } => Mutation::create_library(tree, f64::from(*x), f64::from(*y), millis),
        Edit::Remove(i) => Mutation::RemoveLibrary {
            node_id: i.get(&nodes).clone(),
        },
        Edit::Connect(a, b) => Mutation::connect(tree, a.get::<String>(&nodes), b.get::<String>(&nodes), millis),
        Edit::Disconnect(e) if !edges.is_empty() => Mutation::Disconnect {
            edge_id: e.get(&edges).clone(),
        },
        Edit::Reconnect(e, a, b) if !edges.is_empty() => Mutation::Reconnect {
            edge_id: e.get(&edges).clone(),
            parent: a.get(&nodes).clone(),
            child: b.get(&nodes).clone(),
        },
        Edit::Rename(i, name) => Mutation::UpdateLibrary {
            node_id: i.get(&nodes).clone(),
            changes: LibraryChanges {
                name: Some(name.clone()),
                library_name: Some(name.clone()),
                ..Default::default()
            },
        },
        Edit::Move(i, x, y) => Mutation::SetBounds {
            node_id: i.get(&nodes).clone(),
            bounds: Some(Bounds::library_at(f64::from(*x), f64::from(*y))),
        },
        Edit::Disconnect(_) | Edit::Reconnect(..) => return None,
    };
    Some(mutation)
}

fn fixture() -> HierarchyTree {
    decode(THREE_LEVELS, DEFAULT_ROOT_NAME).unwrap()
}

proptest! {
    #[test]
    fn n_edits_then_n_undos_restore_the_tree(edits in prop::collection::vec(edit(), 1..24)) {
        let mut tree = fixture();
        let original = tree.clone();
        let mut tracker = ChangeTracker::with_max_levels(0);

        let mut recorded = 0;
        for (i, edit) in edits.iter().enumerate() {
            if let Some(mutation) = to_mutation(&tree, edit, i as i64) {
                if tracker.record(&mutation, &mut tree).is_ok() {
                    recorded += 1;
                }
            }
        }
        prop_assert_eq!(tracker.undo_levels(), recorded);

        for _ in 0..recorded {
            prop_assert!(tracker.undo(&mut tree).unwrap());
        }
        prop_assert!(!tracker.can_undo());
        prop_assert!(!tracker.is_dirty());
        prop_assert_eq!(&tree, &original);
        prop_assert_eq!(encode(&tree).unwrap(), encode(&original).unwrap());
    }

    #[test]
    fn redo_replays_to_the_same_tree(edits in prop::collection::vec(edit(), 1..16)) {
        let mut tree = fixture();
        let mut tracker = ChangeTracker::with_max_levels(0);

        for (i, edit) in edits.iter().enumerate() {
            if let Some(mutation) = to_mutation(&tree, edit, i as i64) {
                let _ = tracker.record(&mutation, &mut tree);
            }
        }
        let edited = tree.clone();

        while tracker.undo(&mut tree).unwrap() {}
        while tracker.redo(&mut tree).unwrap() {}
        prop_assert_eq!(tree, edited);
    }
}

#[test]
fn test_remove_subtree_parent_then_undo() {
    let mut tree = fixture();
    let mut tracker = ChangeTracker::new();

    tracker
        .record(
            &Mutation::RemoveLibrary {
                node_id: "lib_core".to_string(),
            },
            &mut tree,
        )
        .unwrap();

    // The child stays, unconnected.
    assert!(tree.contains("lib_ui"));
    assert_eq!(tree.parent_id("lib_ui"), None);
    assert!(validate(&tree).is_valid());

    tracker.undo(&mut tree).unwrap();
    assert_eq!(tree.parent_id("lib_ui"), Some("lib_core"));
    assert_eq!(tree.parent_id("lib_core"), Some("root"));
    assert_eq!(encode(&tree).unwrap(), encode(&fixture()).unwrap());
}

#[test]
fn test_rewire_in_any_order() {
    let mut tree = fixture();
    let mut tracker = ChangeTracker::new();

    // Move lib_ui from lib_core to lib_data by adding the new edge first.
    let connect = Mutation::connect(&tree, "lib_data", "lib_ui", 1);
    tracker.record(&connect, &mut tree).unwrap();
    assert!(!validate(&tree).is_valid());

    tracker
        .record(
            &Mutation::Disconnect {
                edge_id: "Flow_ui".to_string(),
            },
            &mut tree,
        )
        .unwrap();
    assert!(validate(&tree).is_valid());
    assert_eq!(tree.parent_id("lib_ui"), Some("lib_data"));
}

//! # Hierarchy Validation
//!
//! Save-time checks on a [`HierarchyTree`]. Interactive edits may leave the
//! tree invalid for a while; only a save is gated on these rules.

use crate::model::HierarchyTree;
use serde::Serialize;
use tracing::debug;

pub const MULTIPLE_PARENTS: &str = "A library must not have more than one parent library.";

/// One broken rule, attributed to the offending library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub library_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violation messages in tree order, one per offending library
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }
}

/// Check every non-root library for more than one incoming parent edge
pub fn validate(tree: &HierarchyTree) -> ValidationReport {
    let adjacency = tree.adjacency();

    let violations: Vec<Violation> = tree
        .nodes()
        .filter(|node| !node.is_root())
        .filter(|node| adjacency.incoming_count(&node.id) > 1)
        .map(|node| Violation {
            library_id: node.id.clone(),
            message: MULTIPLE_PARENTS.to_string(),
        })
        .collect();

    debug!(
        libraries = tree.len(),
        violations = violations.len(),
        "Validated library hierarchy"
    );
    ValidationReport { violations }
}

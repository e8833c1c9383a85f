//! # Library Hierarchy Document
//!
//! Persisted form of a library hierarchy and its in-memory model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ xml: document text ⇄ generic element tree   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ codec: element tree ⇄ HierarchyTree         │
//! │  - libraries, parent edges, diagram layout  │
//! │  - unknown content carried opaquely         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ validate: save-time tree invariants         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hierarchy_document::{decode, encode, validate, DEFAULT_ROOT_NAME};
//!
//! let tree = decode(&xml, DEFAULT_ROOT_NAME)?;
//! if validate(&tree).is_valid() {
//!     let xml = encode(&tree)?;
//! }
//! ```

pub mod codec;
pub mod error;
pub mod export;
pub mod model;
pub mod validate;
pub mod xml;

pub use codec::{decode, default_tree, encode};
pub use error::{DocumentError, DocumentResult};
pub use export::{export, export_file_stem, ExportBlob};
pub use model::{
    Adjacency, Bounds, DiagramLayout, DiagramShape, EdgeLayout, ElementResidue, HierarchyTree,
    LibraryAttributes, LibraryNode, OpaqueContent, ParentEdge, Waypoint, DEFAULT_ROOT_NAME,
    LIBRARY_HEIGHT, LIBRARY_WIDTH, ROOT_ELEMENT_ID, ROOT_LIBRARY_ID,
};
pub use validate::{validate, ValidationReport, Violation, MULTIPLE_PARENTS};

//! Error types for the editor

use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document error: {0}")]
    Document(#[from] hierarchy_document::DocumentError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("History error: {0}")]
    History(#[from] crate::undo_stack::HistoryError),

    #[error("Document is read-only")]
    ReadOnly,

    #[error("Hierarchy is invalid: {}", violations.join(" "))]
    Validation { violations: Vec<String> },

    #[error("Could not publish document: {0}")]
    Persistence(String),
}

impl From<crate::host::HostError> for EditorError {
    fn from(e: crate::host::HostError) -> Self {
        EditorError::Persistence(e.0)
    }
}

impl EditorError {
    /// Violation messages when a save was blocked by validation
    pub fn violations(&self) -> &[String] {
        match self {
            EditorError::Validation { violations } => violations,
            _ => &[],
        }
    }
}

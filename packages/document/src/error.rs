use thiserror::Error;

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Malformed document at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("Unexpected root element '{found}', expected a definitions element")]
    UnexpectedRoot { found: String },

    #[error("Library '{library_id}' is declared more than once")]
    DuplicateLibrary { library_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }

    pub fn unexpected_root(found: impl Into<String>) -> Self {
        Self::UnexpectedRoot {
            found: found.into(),
        }
    }

    /// Whether this error means the input could not be read as a hierarchy
    /// document at all. Callers keep their last good tree in that case.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::UnexpectedRoot { .. } | Self::DuplicateLibrary { .. }
        )
    }
}

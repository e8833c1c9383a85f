pub mod export;
pub mod init;
pub mod tree;
pub mod validate;
pub mod watch;

pub use export::{export, ExportArgs};
pub use init::{init, InitArgs};
pub use tree::{tree, TreeArgs};
pub use validate::{validate, ValidateArgs};
pub use watch::{watch, WatchArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use hierarchy_document::{decode, HierarchyTree};
use std::path::{Path, PathBuf};

/// Read and decode a hierarchy document
pub fn load_tree(path: &Path, root_name: &str) -> Result<HierarchyTree> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let tree = decode(&source, root_name)
        .with_context(|| format!("Cannot load {}", path.display()))?;
    Ok(tree)
}

/// An explicit path argument, or the configured document
pub fn document_path(input: Option<PathBuf>, config: &Config, cwd: &str) -> PathBuf {
    match input {
        Some(path) if path.is_absolute() => path,
        Some(path) => PathBuf::from(cwd).join(path),
        None => config.get_document_path(cwd),
    }
}

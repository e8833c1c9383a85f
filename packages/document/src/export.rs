//! Naming and packaging of downloadable hierarchy documents.

use crate::codec::encode;
use crate::error::DocumentResult;
use crate::model::HierarchyTree;

pub const EXPORT_SUFFIX: &str = "Library_Hierarchy";
pub const EXPORT_EXTENSION: &str = "bpmn";
pub const EXPORT_MIME: &str = "application/bpmn+xml";

/// A document ready to be handed to a download or file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBlob {
    pub file_stem: String,
    pub mime_type: &'static str,
    pub contents: String,
}

impl ExportBlob {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_stem, EXPORT_EXTENSION)
    }
}

/// `<Name>_Library_Hierarchy` with whitespace runs replaced by `_`,
/// or `Library_Hierarchy` when no framework name is set
pub fn export_file_stem(framework_name: Option<&str>) -> String {
    match framework_name.filter(|name| !name.is_empty()) {
        Some(name) => {
            let mut stem = String::with_capacity(name.len() + EXPORT_SUFFIX.len() + 1);
            let mut in_space = false;
            for ch in name.chars() {
                if ch.is_whitespace() {
                    if !in_space {
                        stem.push('_');
                    }
                    in_space = true;
                } else {
                    stem.push(ch);
                    in_space = false;
                }
            }
            stem.push('_');
            stem.push_str(EXPORT_SUFFIX);
            stem
        }
        None => EXPORT_SUFFIX.to_string(),
    }
}

pub fn export(tree: &HierarchyTree, framework_name: Option<&str>) -> DocumentResult<ExportBlob> {
    Ok(ExportBlob {
        file_stem: export_file_stem(framework_name),
        mime_type: EXPORT_MIME,
        contents: encode(tree)?,
    })
}

use hierarchy_editor::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "hierarchy.config.json";
pub const DEFAULT_DOCUMENT_NAME: &str = "hierarchy.bpmn";

/// Project configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Hierarchy document, relative to the project directory
    #[serde(default = "default_document")]
    pub document: String,

    /// Framework name used for the root library and export names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_name: Option<String>,

    #[serde(flatten)]
    pub session: SessionConfig,
}

fn default_document() -> String {
    DEFAULT_DOCUMENT_NAME.to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_document_path(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.document)
    }

    /// Name for a synthesised root
    pub fn root_name(&self) -> &str {
        self.framework_name
            .as_deref()
            .unwrap_or(&self.session.default_root_name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document: default_document(),
            framework_name: None,
            session: SessionConfig::default(),
        }
    }
}

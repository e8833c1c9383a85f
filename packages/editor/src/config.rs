use crate::notices::{MAX_NOTICE_DURATION, MIN_NOTICE_DURATION};
use hierarchy_document::DEFAULT_ROOT_NAME;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-deployment session behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Root label when neither a document nor a framework name is known
    #[serde(default = "default_root_name")]
    pub default_root_name: String,

    /// Save after every committed edit instead of only on request
    #[serde(default)]
    pub auto_save: bool,

    /// How long notices stay up, clamped to 4000..=5000
    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,

    /// Undo depth, 0 for unlimited
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Delay before a dispatched navigation settles
    #[serde(default = "default_navigation_settle_ms")]
    pub navigation_settle_ms: u64,
}

fn default_root_name() -> String {
    DEFAULT_ROOT_NAME.to_string()
}

fn default_notice_duration_ms() -> u64 {
    4000
}

fn default_max_history() -> usize {
    100
}

fn default_navigation_settle_ms() -> u64 {
    10
}

impl SessionConfig {
    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms).clamp(MIN_NOTICE_DURATION, MAX_NOTICE_DURATION)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_root_name: default_root_name(),
            auto_save: false,
            notice_duration_ms: default_notice_duration_ms(),
            max_history: default_max_history(),
            navigation_settle_ms: default_navigation_settle_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "defaultRootName": "Controls",
            "autoSave": true,
            "noticeDurationMs": 9000,
            "maxHistory": 0
        }"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_root_name, "Controls");
        assert!(config.auto_save);
        assert_eq!(config.notice_duration(), Duration::from_millis(5000));
        assert_eq!(config.max_history, 0);
        assert_eq!(config.navigation_settle_ms, 10);
    }

    #[test]
    fn test_default_config() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.default_root_name, "Framework Root");
        assert!(!config.auto_save);
        assert_eq!(config.notice_duration(), Duration::from_millis(4000));
    }
}

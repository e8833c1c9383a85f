//! Hosts a session can run against: one in memory, one backed by a file.

use hierarchy_editor::{
    ActionCapability, ChannelStatus, CountingCommand, DocumentPort, HostError, NavigationPort,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Host that keeps the document value in memory
#[derive(Debug, Clone)]
pub struct MemoryHost {
    pub document: Option<String>,
    pub save: CountingCommand,
    pub status: ChannelStatus,
    pub clicked_library: Option<String>,
    pub enter: CountingCommand,

    /// When set, publishing fails with this message
    pub publish_error: Option<String>,
}

impl MemoryHost {
    pub fn new(document: Option<&str>) -> Self {
        Self {
            document: document.map(str::to_string),
            save: CountingCommand::enabled(),
            status: ChannelStatus::Available,
            clicked_library: None,
            enter: CountingCommand::enabled(),
            publish_error: None,
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DocumentPort for MemoryHost {
    fn publish(&mut self, document: &str) -> Result<(), HostError> {
        if let Some(message) = &self.publish_error {
            return Err(HostError::new(message.clone()));
        }
        self.document = Some(document.to_string());
        Ok(())
    }

    fn save_requested(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.save)
    }
}

impl NavigationPort for MemoryHost {
    fn channel_status(&self) -> ChannelStatus {
        self.status
    }

    fn write_target(&mut self, library_id: &str) -> bool {
        if self.status != ChannelStatus::Available {
            return false;
        }
        self.clicked_library = Some(library_id.to_string());
        true
    }

    fn library_clicked(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.enter)
    }
}

/// Host whose document value is a file on disk
#[derive(Debug)]
pub struct FileHost {
    path: PathBuf,
    clicked_library: Option<String>,
    save: CountingCommand,
    enter: CountingCommand,
}

impl FileHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clicked_library: None,
            save: CountingCommand::enabled(),
            enter: CountingCommand::enabled(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents, `None` when the file does not exist
    pub fn read(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn clicked_library(&self) -> Option<&str> {
        self.clicked_library.as_deref()
    }

    /// How many saves were committed
    pub fn saves(&self) -> usize {
        self.save.executions
    }
}

impl DocumentPort for FileHost {
    fn publish(&mut self, document: &str) -> Result<(), HostError> {
        // Write beside the target and rename so watchers never see half a file.
        let staging = self.path.with_extension("bpmn.tmp");
        std::fs::write(&staging, document)
            .and_then(|_| std::fs::rename(&staging, &self.path))
            .map_err(|e| HostError::new(format!("{}: {}", self.path.display(), e)))?;
        info!(path = %self.path.display(), bytes = document.len(), "Wrote hierarchy document");
        Ok(())
    }

    fn save_requested(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.save)
    }
}

impl NavigationPort for FileHost {
    fn channel_status(&self) -> ChannelStatus {
        ChannelStatus::Available
    }

    fn write_target(&mut self, library_id: &str) -> bool {
        debug!(library_id, "Clicked library");
        self.clicked_library = Some(library_id.to_string());
        true
    }

    fn library_clicked(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.enter)
    }
}

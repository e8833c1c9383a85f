use crate::driver::{DriverHandle, HostEvent};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

/// Watches a single document file for external changes.
///
/// The parent directory is watched rather than the file, since saves
/// replace the file by rename.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    path: PathBuf,
}

impl DocumentWatcher {
    pub fn new(path: impl Into<PathBuf>) -> WatcherResult<Self> {
        let path = path.into();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if path.file_name().is_none() {
            return Err(WatcherError::WatchError(format!(
                "{} does not name a file",
                path.display()
            )));
        }

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "Watching hierarchy document");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the document changes. `None` once the watcher is gone.
    pub fn next_change(&self) -> Option<Event> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(event)) if self.concerns_document(&event) => return Some(event),
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => warn!(error = %err, "Watch error"),
                Err(_) => return None,
            }
        }
    }

    /// Like [`next_change`](Self::next_change) but gives up after `timeout`
    pub fn next_change_timeout(&self, timeout: Duration) -> Option<Event> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            match self.receiver.recv_timeout(remaining) {
                Ok(Ok(event)) if self.concerns_document(&event) => return Some(event),
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => warn!(error = %err, "Watch error"),
                Err(_) => return None,
            }
        }
    }

    fn concerns_document(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        let name = self.path.file_name();
        event
            .paths
            .iter()
            .any(|changed| changed.file_name() == name)
    }

    /// Forward each change to a running driver as the new document value.
    /// Runs until the watcher or the driver goes away.
    pub fn forward(self, handle: DriverHandle) {
        while self.next_change().is_some() {
            let document = match std::fs::read_to_string(&self.path) {
                Ok(contents) => Some(contents),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "Could not read document");
                    continue;
                }
            };
            debug!(path = %self.path.display(), "Document changed on disk");
            if handle.blocking_send(HostEvent::DocumentChanged(document)).is_err() {
                break;
            }
        }
        debug!("Document watcher stopped");
    }
}

//! Runs a hierarchy edit session against a real host.
//!
//! [`SessionDriver`] owns an [`EditSession`](hierarchy_editor::EditSession)
//! on a tokio task and feeds it host events in order. [`FileHost`] keeps the
//! document in a file and [`DocumentWatcher`] reports outside edits to it.

pub mod driver;
pub mod host;
pub mod watcher;

pub use driver::{
    DriverError, DriverHandle, DriverResult, HostEvent, SessionDriver, SessionUpdate, TokioClock,
};
pub use host::{FileHost, MemoryHost};
pub use watcher::{DocumentWatcher, WatcherError, WatcherResult};

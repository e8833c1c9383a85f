//! # Library Hierarchy Editor
//!
//! Synchronization and consistency layer between a hierarchy document
//! held by a host and the diagram surface editing it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: codec, validator, export          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditSession                         │
//! │  - Import external documents, skip echoes   │
//! │  - Mutations with undo/redo and dirty flag  │
//! │  - Lock-gated editing                       │
//! │  - Validate → encode → publish on save      │
//! │  - Navigation into child libraries          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ host: document value, save command,         │
//! │       clicked-library channel, lock inputs  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Tree is source of truth**: parents and the adjacency view are derived from edges
//! 2. **Fail closed**: anything uncertain about the lock means read-only
//! 3. **Validate at save time only**: edits may pass through invalid states
//! 4. **Check before execute**: host commands run only through a ready capability
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hierarchy_editor::{EditSession, LockState, Mutation, SessionConfig};
//!
//! let mut session = EditSession::init(SessionConfig::default(), host, document, Some("Acme"));
//! session.on_lock_changed(LockState::owned_by("me@acme.test"), false);
//!
//! let create = Mutation::create_library(session.tree(), 200.0, 240.0, now_millis);
//! session.apply(&create)?;
//! session.save()?;
//! ```

mod config;
mod errors;
mod host;
mod lock;
mod mutations;
mod navigation;
mod notices;
mod session;
mod undo_stack;

pub use config::SessionConfig;
pub use errors::{EditorError, EditorResult};
pub use host::{
    ActionCapability, ChannelStatus, CountingCommand, DocumentPort, Host, HostCommand, HostError,
    NavigationPort, ReadyAction,
};
pub use lock::{is_editable, LockCoordinator, LockState};
pub use mutations::{
    ConnectionSnapshot, LibraryChanges, LibrarySnapshot, Mutation, MutationError,
    CONNECTION_ELEMENT_PREFIX, LIBRARY_ELEMENT_PREFIX, NEW_LIBRARY_NAME,
};
pub use navigation::{DispatchOutcome, NavigationGate, NavigationState, RequestOutcome};
pub use notices::{Notice, NoticeBoard, NoticeKind, MAX_NOTICE_DURATION, MIN_NOTICE_DURATION};
pub use session::{
    Clock, EditSession, ImportOutcome, MonotonicClock, DEFAULT_TITLE, SAVE_BEFORE_NAVIGATING,
};
pub use undo_stack::{ChangeTracker, HistoryError, MutationBatch};

// Re-export document types for convenience
pub use hierarchy_document::{ExportBlob, HierarchyTree, LibraryNode, ParentEdge};

/// Milliseconds since the Unix epoch, the token new ids are built from
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

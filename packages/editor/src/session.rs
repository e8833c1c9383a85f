//! # Edit Session
//!
//! One editing surface's state: the canonical tree, its history, the lock
//! view, pending navigation and open notices. Nothing is shared between
//! sessions; a host is owned for the session's lifetime and handed back by
//! [`EditSession::dispose`].
//!
//! ## Flow
//!
//! - External document changes are imported unless they are the echo of
//!   what the session itself last saw or wrote
//! - Edits go through the [`ChangeTracker`] and are refused while the
//!   session is not editable
//! - A save validates, encodes, publishes and only then marks the history
//!   clean; any failure leaves tree and history as they were
//! - Failures never escape as panics; they are raised as notices

use crate::config::SessionConfig;
use crate::errors::{EditorError, EditorResult};
use crate::host::{ActionCapability, Host};
use crate::lock::{LockCoordinator, LockState};
use crate::mutations::Mutation;
use crate::navigation::{DispatchOutcome, NavigationGate, NavigationState, RequestOutcome};
use crate::notices::{Notice, NoticeBoard, NoticeKind};
use crate::undo_stack::ChangeTracker;
use hierarchy_document::{decode, default_tree, encode, export, validate, ExportBlob, HierarchyTree};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Header shown when no framework name is known
pub const DEFAULT_TITLE: &str = "Library Hierarchy";

pub const SAVE_BEFORE_NAVIGATING: &str = "Please save your changes before opening another library.";

/// Time source for notice deadlines
pub trait Clock: Send {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
pub struct MonotonicClock(Instant);

impl MonotonicClock {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// What an external document change did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Tree replaced, history reset
    Imported,

    /// Same text as last seen; nothing to do
    Unchanged,

    /// No document value; the current tree stays
    Empty,

    /// Document could not be decoded; the last good tree stays
    Rejected { reason: String },
}

/// Single edit session over one hierarchy document
pub struct EditSession<H: Host> {
    config: SessionConfig,
    host: H,
    tree: HierarchyTree,
    history: ChangeTracker,
    lock: LockCoordinator,
    navigation: NavigationGate,
    notices: NoticeBoard,
    clock: Box<dyn Clock>,

    /// Text of the last document imported or published
    last_document: Option<String>,

    /// False while the tree is still the synthesized default
    imported: bool,
    name_hint: Option<String>,
}

impl<H: Host> EditSession<H> {
    /// Start a session from the host's current document value and
    /// framework name. The session is read-only until a lock update says
    /// otherwise.
    pub fn init(
        config: SessionConfig,
        host: H,
        document: Option<&str>,
        name_hint: Option<&str>,
    ) -> Self {
        Self::with_clock(config, host, document, name_hint, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: SessionConfig,
        host: H,
        document: Option<&str>,
        name_hint: Option<&str>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut history = ChangeTracker::with_max_levels(config.max_history);
        history.set_locked(true);

        let name_hint = name_hint.and_then(non_blank).map(str::to_string);
        let root_name = name_hint.as_deref().unwrap_or(&config.default_root_name);

        let mut session = Self {
            tree: default_tree(root_name),
            notices: NoticeBoard::new(config.notice_duration()),
            config,
            host,
            history,
            lock: LockCoordinator::new(),
            navigation: NavigationGate::new(),
            clock,
            last_document: None,
            imported: false,
            name_hint,
        };

        let outcome = session.on_external_document_changed(document);
        debug!(?outcome, libraries = session.tree.len(), "Session initialised");
        session
    }

    /// End the session and hand back its host
    pub fn dispose(self) -> H {
        debug!("Session disposed");
        self.host
    }

    /// Import a new document value from the host
    pub fn on_external_document_changed(&mut self, document: Option<&str>) -> ImportOutcome {
        let Some(document) = document.filter(|d| !d.trim().is_empty()) else {
            return ImportOutcome::Empty;
        };

        if self.last_document.as_deref() == Some(document) {
            debug!("Document unchanged since last import, skipping");
            return ImportOutcome::Unchanged;
        }
        // Remembered even when decoding fails so a bad value is not retried.
        self.last_document = Some(document.to_string());

        match decode(document, self.root_label()) {
            Ok(tree) => {
                self.tree = tree;
                self.history.reset();
                self.imported = true;
                info!(
                    libraries = self.tree.len(),
                    connections = self.tree.edge_count(),
                    "Imported library hierarchy"
                );
                ImportOutcome::Imported
            }
            Err(err) => {
                warn!(error = %err, "Keeping last good hierarchy");
                let reason = err.to_string();
                self.notify(
                    NoticeKind::Warning,
                    format!("The library hierarchy could not be loaded: {}", reason),
                );
                ImportOutcome::Rejected { reason }
            }
        }
    }

    /// Track the framework name. Until a real document exists, the root
    /// library follows it. Returns true when the root was renamed.
    pub fn on_name_hint_changed(&mut self, name: Option<&str>) -> bool {
        self.name_hint = name.and_then(non_blank).map(str::to_string);

        let Some(name) = self.name_hint.clone() else {
            return false;
        };
        if self.imported {
            return false;
        }
        let Some(root) = self.tree.root().map(|root| root.id.clone()) else {
            return false;
        };

        if let Some(node) = self.tree.node_mut(&root) {
            node.name = name.clone();
            node.attributes.library_name = name;
        }
        debug!(root_name = ?self.name_hint, "Renamed default root");
        true
    }

    /// Recompute editability. Returns true when it changed, in which case
    /// command interception must be rebound.
    pub fn on_lock_changed(&mut self, lock: LockState, read_only: bool) -> bool {
        let changed = self.lock.update(lock, read_only);
        if changed {
            let editable = self.lock.is_editable();
            if !editable {
                self.history.end_batch();
            }
            self.history.set_locked(!editable);
        }
        changed
    }

    /// Apply one edit. Refused while not editable.
    pub fn apply(&mut self, mutation: &Mutation) -> EditorResult<()> {
        self.ensure_editable()?;
        self.history.record(mutation, &mut self.tree)?;
        self.after_edit();
        Ok(())
    }

    /// Group the following edits into one undo step
    pub fn begin_batch(&mut self, description: &str) -> EditorResult<()> {
        self.ensure_editable()?;
        self.history.begin_batch();
        self.history.set_batch_description(description);
        Ok(())
    }

    /// Close the open batch as one undo step. Returns false when no batch
    /// was open.
    pub fn end_batch(&mut self) -> bool {
        if !self.history.in_batch() {
            return false;
        }
        self.history.end_batch();
        self.after_edit();
        true
    }

    /// Revert and drop the edits of the open batch
    pub fn abort_batch(&mut self) -> EditorResult<bool> {
        if !self.history.in_batch() {
            return Ok(false);
        }
        self.history.abort_batch(&mut self.tree)?;
        debug!("Batch aborted");
        Ok(true)
    }

    /// Undo the last edit; `Ok(false)` when there is nothing to undo
    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_editable()?;
        let undone = self.history.undo(&mut self.tree)?;
        if undone {
            self.after_edit();
        }
        Ok(undone)
    }

    /// Redo the last undone edit; `Ok(false)` when there is nothing to redo
    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_editable()?;
        let redone = self.history.redo(&mut self.tree)?;
        if redone {
            self.after_edit();
        }
        Ok(redone)
    }

    /// Validate, encode and publish the tree, then mark it clean.
    ///
    /// Every failure is also raised as a notice. On failure the tree and
    /// its history are untouched so the user can fix things and retry.
    pub fn save(&mut self) -> EditorResult<()> {
        let result = self.try_save();
        if let Err(err) = &result {
            match err {
                EditorError::Validation { violations } => {
                    for message in violations.clone() {
                        self.notify(NoticeKind::Error, message);
                    }
                }
                other => {
                    let message = other.to_string();
                    self.notify(NoticeKind::Error, message);
                }
            }
        }
        result
    }

    fn try_save(&mut self) -> EditorResult<()> {
        self.ensure_editable()?;
        self.history.end_batch();

        let report = validate(&self.tree);
        if !report.is_valid() {
            info!(violations = report.violations.len(), "Save refused by validation");
            return Err(EditorError::Validation {
                violations: report.messages(),
            });
        }

        let document = encode(&self.tree)?;

        if !self.host.save_requested().is_ready() {
            return Err(EditorError::Persistence(
                "the save command is not available".to_string(),
            ));
        }
        self.host.publish(&document)?;
        // The host echoes the published value back; it must not re-import.
        self.last_document = Some(document);

        match self.host.save_requested() {
            ActionCapability::Ready(action) => action.execute()?,
            ActionCapability::Unavailable => {
                return Err(EditorError::Persistence(
                    "the save command is not available".to_string(),
                ))
            }
        }

        self.history.mark_saved();
        self.imported = true;
        info!(libraries = self.tree.len(), "Published library hierarchy");
        Ok(())
    }

    /// Double-click on a library: navigate into it once the host's channel
    /// accepts the target. Refused with a notice while there are unsaved
    /// changes.
    pub fn library_activated(&mut self, library_id: &str) -> EditorResult<RequestOutcome> {
        if !self.tree.contains(library_id) {
            return Err(crate::mutations::MutationError::LibraryNotFound(library_id.to_string()).into());
        }

        let outcome = self.navigation.request(library_id, self.history.is_dirty());
        match outcome {
            RequestOutcome::Refused => {
                self.notify(NoticeKind::Warning, SAVE_BEFORE_NAVIGATING);
            }
            RequestOutcome::Pending { .. } => {
                self.on_channel_ready();
            }
        }
        Ok(outcome)
    }

    /// Offer the host's channel to a waiting navigation
    pub fn on_channel_ready(&mut self) -> DispatchOutcome {
        self.navigation.on_channel_ready(&mut self.host)
    }

    /// Return a dispatched navigation to idle
    pub fn settle_navigation(&mut self) -> bool {
        self.navigation.complete()
    }

    /// Drop a navigation still waiting for the channel
    pub fn cancel_navigation(&mut self) -> Option<String> {
        self.navigation.cancel()
    }

    /// Current tree as a downloadable document
    pub fn export(&self) -> EditorResult<ExportBlob> {
        Ok(export(&self.tree, self.name_hint.as_deref())?)
    }

    /// Framework name, or the generic title when none is set
    pub fn display_title(&self) -> &str {
        self.name_hint.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    /// Drop notices whose time is up; returns how many went away
    pub fn expire_notices(&mut self) -> usize {
        let now = self.clock.elapsed();
        self.notices.expire(now)
    }

    /// Time until the next notice expires
    pub fn next_notice_in(&self) -> Option<Duration> {
        let now = self.clock.elapsed();
        self.notices
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.notices()
    }

    pub fn tree(&self) -> &HierarchyTree {
        &self.tree
    }

    pub fn history(&self) -> &ChangeTracker {
        &self.history
    }

    pub fn is_editable(&self) -> bool {
        self.lock.is_editable()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    /// Bumped whenever editability changes
    pub fn binding_generation(&self) -> u64 {
        self.lock.generation()
    }

    pub fn lock(&self) -> &LockState {
        self.lock.lock()
    }

    pub fn navigation_state(&self) -> &NavigationState {
        self.navigation.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Whether the tree is still the synthesized default
    pub fn is_default_tree(&self) -> bool {
        !self.imported
    }

    fn root_label(&self) -> &str {
        self.name_hint
            .as_deref()
            .unwrap_or(&self.config.default_root_name)
    }

    fn ensure_editable(&self) -> EditorResult<()> {
        if self.lock.is_editable() {
            return Ok(());
        }
        debug!("Edit refused, session is read-only");
        Err(EditorError::ReadOnly)
    }

    fn after_edit(&mut self) {
        if !self.config.auto_save || self.history.in_batch() {
            return;
        }
        if let Err(err) = self.save() {
            debug!(error = %err, "Auto-save did not publish");
        }
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let now = self.clock.elapsed();
        self.notices.raise(kind, message, now)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

//! # Session Driver
//!
//! Runs one [`EditSession`] on a tokio task. Host events arrive on an mpsc
//! channel and are applied strictly in receipt order; every resulting
//! change is broadcast as a [`SessionUpdate`]. The same loop expires
//! notices on their deadline and settles dispatched navigations after the
//! configured delay.
//!
//! Dropping every [`DriverHandle`] (or sending [`HostEvent::Shutdown`])
//! stops the loop; the task's output is the disposed session's host.

use hierarchy_editor::{
    Clock, DispatchOutcome, EditSession, EditorError, Host, ImportOutcome, LockState, Mutation,
    NavigationState, Notice, RequestOutcome, SessionConfig,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

const EVENT_BUFFER: usize = 100;
const UPDATE_BUFFER: usize = 256;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Session driver has stopped")]
    Stopped,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Inputs from the host page, in the order they happened
#[derive(Debug, Clone)]
pub enum HostEvent {
    DocumentChanged(Option<String>),
    NameHintChanged(Option<String>),
    LockChanged { lock: LockState, read_only: bool },
    Edit(Mutation),
    BeginBatch(String),
    EndBatch,
    AbortBatch,
    Undo,
    Redo,
    Save,
    LibraryActivated(String),
    ChannelReady,
    CancelNavigation,
    DismissNotice(u64),
    Shutdown,
}

/// What observers of a session are told
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionUpdate {
    /// A new tree replaced the old one; the view should refit
    Imported { libraries: usize },
    ImportRejected { reason: String },
    TreeChanged { libraries: usize, dirty: bool },
    EditRefused { message: String },
    Saved,
    SaveFailed { message: String, violations: Vec<String> },
    /// Command interception must be rebound
    EditabilityChanged { editable: bool, generation: u64 },
    Navigation { state: NavigationState },
    Notices { notices: Vec<Notice> },
}

/// Notice clock that follows tokio time, including paused test time
pub struct TokioClock(Instant);

impl TokioClock {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Sending side of a running driver
#[derive(Clone)]
pub struct DriverHandle {
    events: mpsc::Sender<HostEvent>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl DriverHandle {
    pub async fn send(&self, event: HostEvent) -> DriverResult<()> {
        self.events.send(event).await.map_err(|_| DriverError::Stopped)
    }

    /// Blocking send for threads outside the runtime
    pub fn blocking_send(&self, event: HostEvent) -> DriverResult<()> {
        self.events
            .blocking_send(event)
            .map_err(|_| DriverError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }
}

pub struct SessionDriver<H: Host> {
    session: EditSession<H>,
    events: mpsc::Receiver<HostEvent>,
    updates: broadcast::Sender<SessionUpdate>,
    settle_delay: Duration,
    settle_at: Option<Instant>,
}

impl<H: Host + Send + 'static> SessionDriver<H> {
    /// Start a session on its own task. Observers should subscribe before
    /// sending the first event.
    pub fn spawn(
        config: SessionConfig,
        host: H,
        document: Option<&str>,
        name_hint: Option<&str>,
    ) -> (DriverHandle, JoinHandle<H>) {
        let session =
            EditSession::with_clock(config, host, document, name_hint, Box::new(TokioClock::new()));
        Self::spawn_session(session)
    }

    pub fn spawn_session(session: EditSession<H>) -> (DriverHandle, JoinHandle<H>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (update_tx, _) = broadcast::channel(UPDATE_BUFFER);

        let driver = SessionDriver {
            settle_delay: session.config().navigation_settle(),
            session,
            events: event_rx,
            updates: update_tx.clone(),
            settle_at: None,
        };
        let task = tokio::spawn(driver.run());

        (
            DriverHandle {
                events: event_tx,
                updates: update_tx,
            },
            task,
        )
    }

    async fn run(mut self) -> H {
        info!("Session driver started");

        loop {
            let notice_in = self.session.next_notice_in();
            let settle_at = self.settle_at;

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(HostEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event),
                },
                _ = sleep_for(notice_in) => {
                    if self.session.expire_notices() > 0 {
                        self.publish_notices();
                    }
                }
                _ = sleep_until(settle_at) => {
                    self.settle_at = None;
                    if self.session.settle_navigation() {
                        self.publish_navigation();
                    }
                }
            }
        }

        info!("Session driver stopped");
        self.session.dispose()
    }

    fn handle(&mut self, event: HostEvent) {
        debug!(?event, "Host event");
        let notices_before = self.session.notices().len();

        match event {
            HostEvent::DocumentChanged(document) => {
                match self.session.on_external_document_changed(document.as_deref()) {
                    ImportOutcome::Imported => {
                        let libraries = self.session.tree().len();
                        self.broadcast(SessionUpdate::Imported { libraries });
                    }
                    ImportOutcome::Rejected { reason } => {
                        self.broadcast(SessionUpdate::ImportRejected { reason });
                    }
                    ImportOutcome::Unchanged | ImportOutcome::Empty => {}
                }
            }

            HostEvent::NameHintChanged(name) => {
                if self.session.on_name_hint_changed(name.as_deref()) {
                    self.publish_tree();
                }
            }

            HostEvent::LockChanged { lock, read_only } => {
                if self.session.on_lock_changed(lock, read_only) {
                    self.broadcast(SessionUpdate::EditabilityChanged {
                        editable: self.session.is_editable(),
                        generation: self.session.binding_generation(),
                    });
                }
            }

            HostEvent::Edit(mutation) => {
                let result = self.session.apply(&mutation);
                self.after_edit(result);
            }

            HostEvent::BeginBatch(description) => {
                if let Err(err) = self.session.begin_batch(&description) {
                    self.refuse(err);
                }
            }

            HostEvent::EndBatch => {
                if self.session.end_batch() {
                    self.publish_tree();
                }
            }

            HostEvent::AbortBatch => match self.session.abort_batch() {
                Ok(true) => self.publish_tree(),
                Ok(false) => {}
                Err(err) => self.refuse(err),
            },

            HostEvent::Undo => {
                let result = self.session.undo().map(|_| ());
                self.after_edit(result);
            }

            HostEvent::Redo => {
                let result = self.session.redo().map(|_| ());
                self.after_edit(result);
            }

            HostEvent::Save => match self.session.save() {
                Ok(()) => self.broadcast(SessionUpdate::Saved),
                Err(err) => self.broadcast(SessionUpdate::SaveFailed {
                    message: err.to_string(),
                    violations: err.violations().to_vec(),
                }),
            },

            HostEvent::LibraryActivated(library_id) => {
                match self.session.library_activated(&library_id) {
                    Ok(RequestOutcome::Refused) => {}
                    Ok(RequestOutcome::Pending { .. }) => self.after_navigation(),
                    Err(err) => self.refuse(err),
                }
            }

            HostEvent::ChannelReady => {
                if self.session.navigation_state() != &NavigationState::Idle {
                    let outcome = self.session.on_channel_ready();
                    if matches!(outcome, DispatchOutcome::Dispatched { .. }) {
                        self.after_navigation();
                    }
                }
            }

            HostEvent::CancelNavigation => {
                if self.session.cancel_navigation().is_some() {
                    self.publish_navigation();
                }
            }

            HostEvent::DismissNotice(id) => {
                if self.session.dismiss_notice(id) {
                    self.publish_notices();
                }
                return;
            }

            HostEvent::Shutdown => {}
        }

        if self.session.notices().len() != notices_before {
            self.publish_notices();
        }
    }

    fn after_edit(&mut self, result: Result<(), EditorError>) {
        match result {
            Ok(()) => self.publish_tree(),
            Err(err) => self.refuse(err),
        }
    }

    fn after_navigation(&mut self) {
        if matches!(self.session.navigation_state(), NavigationState::Dispatched { .. }) {
            self.settle_at = Some(Instant::now() + self.settle_delay);
        }
        self.publish_navigation();
    }

    fn refuse(&mut self, err: EditorError) {
        debug!(error = %err, "Edit refused");
        self.broadcast(SessionUpdate::EditRefused {
            message: err.to_string(),
        });
    }

    fn publish_tree(&self) {
        self.broadcast(SessionUpdate::TreeChanged {
            libraries: self.session.tree().len(),
            dirty: self.session.is_dirty(),
        });
    }

    fn publish_navigation(&self) {
        self.broadcast(SessionUpdate::Navigation {
            state: self.session.navigation_state().clone(),
        });
    }

    fn publish_notices(&self) {
        self.broadcast(SessionUpdate::Notices {
            notices: self.session.notices().to_vec(),
        });
    }

    fn broadcast(&self, update: SessionUpdate) {
        // No subscribers is fine; updates are advisory.
        if self.updates.send(update).is_err() {
            debug!("No session update subscribers");
        }
    }
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("closed", &self.events.is_closed())
            .finish()
    }
}


//! # Navigation Gate
//!
//! Sequences "enter library" requests against the host's clicked-library
//! attribute, which may not accept writes yet.
//!
//! ```text
//!            request (clean)              channel ready, write acked
//!   Idle ─────────────────────▶ Awaiting ───────────────────────────▶ Dispatched
//!    ▲                            │  ▲                                    │
//!    │        cancel / dirty      │  └── request (replaces target)        │
//!    └────────────────────────────┘                                       │
//!    └─────────────────────────────── complete ───────────────────────────┘
//! ```
//!
//! A request while dirty is refused and leaves the gate `Idle`. Waiting for
//! the channel has no timeout.

use crate::host::{ActionCapability, ChannelStatus, NavigationPort};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum NavigationState {
    #[default]
    Idle,
    AwaitingChannel {
        target_id: String,
    },
    Dispatched {
        target_id: String,
    },
}

/// What happened to a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Unsaved changes; nothing was written
    Refused,

    /// Waiting for the channel, `replaced` holds a superseded target
    Pending { replaced: Option<String> },
}

/// Result of offering the channel to a waiting request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was waiting
    Idle,

    /// Channel not ready or write not accepted; still waiting
    Waiting,

    /// Target written; `executed` tells whether the enter command ran
    Dispatched { target_id: String, executed: bool },
}

#[derive(Debug, Default)]
pub struct NavigationGate {
    state: NavigationState,
}

impl NavigationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn pending_target(&self) -> Option<&str> {
        match &self.state {
            NavigationState::AwaitingChannel { target_id } => Some(target_id),
            _ => None,
        }
    }

    /// Ask to enter `target_id`. Last request wins while one is pending.
    pub fn request(&mut self, target_id: &str, is_dirty: bool) -> RequestOutcome {
        if is_dirty {
            if let Some(cancelled) = self.cancel() {
                debug!(target_id = %cancelled, "Pending navigation cancelled by unsaved changes");
            }
            info!(target_id, "Navigation refused, document has unsaved changes");
            return RequestOutcome::Refused;
        }

        let replaced = match std::mem::take(&mut self.state) {
            NavigationState::AwaitingChannel { target_id } => Some(target_id),
            _ => None,
        };
        debug!(target_id, ?replaced, "Navigation awaiting channel");
        self.state = NavigationState::AwaitingChannel {
            target_id: target_id.to_string(),
        };
        RequestOutcome::Pending { replaced }
    }

    /// Hand the pending target to the host if the channel accepts it.
    ///
    /// The enter command is only invoked after the write is acknowledged,
    /// and only if it reports itself executable.
    pub fn on_channel_ready(&mut self, port: &mut dyn NavigationPort) -> DispatchOutcome {
        let Some(target_id) = self.pending_target().map(str::to_string) else {
            return DispatchOutcome::Idle;
        };

        if port.channel_status() != ChannelStatus::Available {
            return DispatchOutcome::Waiting;
        }
        if !port.write_target(&target_id) {
            debug!(target_id = %target_id, "Navigation target write not accepted yet");
            return DispatchOutcome::Waiting;
        }

        let executed = match port.library_clicked() {
            ActionCapability::Ready(action) => match action.execute() {
                Ok(()) => true,
                Err(err) => {
                    warn!(target_id = %target_id, error = %err, "Enter library command failed");
                    false
                }
            },
            ActionCapability::Unavailable => {
                debug!(target_id = %target_id, "Enter library command not executable");
                false
            }
        };

        info!(target_id = %target_id, executed, "Navigation dispatched");
        self.state = NavigationState::Dispatched {
            target_id: target_id.clone(),
        };
        DispatchOutcome::Dispatched {
            target_id,
            executed,
        }
    }

    /// Settle a dispatched navigation back to `Idle`
    pub fn complete(&mut self) -> bool {
        if matches!(self.state, NavigationState::Dispatched { .. }) {
            self.state = NavigationState::Idle;
            return true;
        }
        false
    }

    /// Drop a pending request; returns its target
    pub fn cancel(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            NavigationState::AwaitingChannel { target_id } => Some(target_id),
            other => {
                self.state = other;
                None
            }
        }
    }
}

//! # Host Ports
//!
//! The attributes and commands a hosting page exposes to a session.
//!
//! Host commands are never called directly. A port hands out an
//! [`ActionCapability`], which is only `Ready` when the command reported
//! itself executable at that moment, and only a ready capability can run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Availability of a host attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Loading,
    Available,
    Unavailable,
}

/// A command object offered by the host
pub trait HostCommand {
    fn can_execute(&self) -> bool;
    fn execute(&mut self) -> Result<(), HostError>;
}

/// Result of asking the host whether a command may run now
pub enum ActionCapability<'a> {
    Unavailable,
    Ready(ReadyAction<'a>),
}

impl<'a> ActionCapability<'a> {
    /// Check `command` and wrap it when it can run
    pub fn check(command: &'a mut dyn HostCommand) -> Self {
        if command.can_execute() {
            ActionCapability::Ready(ReadyAction { command })
        } else {
            ActionCapability::Unavailable
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ActionCapability::Ready(_))
    }
}

/// A command that reported itself executable
pub struct ReadyAction<'a> {
    command: &'a mut dyn HostCommand,
}

impl ReadyAction<'_> {
    pub fn execute(self) -> Result<(), HostError> {
        self.command.execute()
    }
}

/// Document value attribute and the save command
pub trait DocumentPort {
    /// Write a serialized document into the document value attribute
    fn publish(&mut self, document: &str) -> Result<(), HostError>;

    /// The host's "save requested" command
    fn save_requested(&mut self) -> ActionCapability<'_>;
}

/// Clicked-library attribute and the "enter library" command
pub trait NavigationPort {
    fn channel_status(&self) -> ChannelStatus;

    /// Write the target library id; returns whether the write was accepted
    fn write_target(&mut self, library_id: &str) -> bool;

    fn library_clicked(&mut self) -> ActionCapability<'_>;
}

/// Everything a session needs from its host
pub trait Host: DocumentPort + NavigationPort {}

impl<T: DocumentPort + NavigationPort> Host for T {}

/// Command that records how often it ran; `enabled` is its `canExecute`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountingCommand {
    pub enabled: bool,
    pub executions: usize,
}

impl CountingCommand {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            executions: 0,
        }
    }
}

impl HostCommand for CountingCommand {
    fn can_execute(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self) -> Result<(), HostError> {
        self.executions += 1;
        Ok(())
    }
}

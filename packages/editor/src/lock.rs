//! # Document Lock
//!
//! Editability from the cooperative single-owner lock. The lock itself is
//! acquired and released elsewhere; this module only reads it.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Lock inputs as last reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockState {
    pub locked_by: Option<String>,
    pub current_user: Option<String>,

    /// False while either identity source is still loading
    pub statuses_loaded: bool,
}

impl LockState {
    pub fn loaded(locked_by: Option<&str>, current_user: Option<&str>) -> Self {
        Self {
            locked_by: locked_by.map(str::to_string),
            current_user: current_user.map(str::to_string),
            statuses_loaded: true,
        }
    }

    /// Lock owned by `user`, viewed by that same user
    pub fn owned_by(user: &str) -> Self {
        Self::loaded(Some(user), Some(user))
    }
}

/// Whether the current user may edit.
///
/// Fails closed: loading identities, an unowned document and an anonymous
/// viewer all mean read-only. Otherwise the viewer must be the owner,
/// compared trimmed and case-insensitively.
pub fn is_editable(lock: &LockState) -> bool {
    if !lock.statuses_loaded {
        return false;
    }

    let Some(owner) = lock.locked_by.as_deref().and_then(normalize) else {
        return false;
    };
    let Some(user) = lock.current_user.as_deref().and_then(normalize) else {
        return false;
    };

    owner == user
}

fn normalize(identity: &str) -> Option<String> {
    let trimmed = identity.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// Tracks editability across host updates.
///
/// Command interception is bound per editability, so every change bumps
/// [`LockCoordinator::generation`] and callers rebind on a new value.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    lock: LockState,
    read_only: bool,
    editable: bool,
    generation: u64,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute from fresh inputs. Returns true when editability changed.
    pub fn update(&mut self, lock: LockState, read_only: bool) -> bool {
        let editable = !read_only && is_editable(&lock);
        self.lock = lock;
        self.read_only = read_only;

        if editable == self.editable {
            return false;
        }

        self.editable = editable;
        self.generation += 1;
        info!(
            editable,
            read_only,
            generation = self.generation,
            "Editability changed"
        );
        true
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn lock(&self) -> &LockState {
        &self.lock
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Incremented on every editability change
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

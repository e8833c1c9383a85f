//! # Change Tracker
//!
//! Linear undo/redo history over [`Mutation`]s with a saved baseline.
//!
//! ## Design
//!
//! - Each mutation records its inverse before being applied
//! - Undo applies the inverse and moves the batch to the redo stack
//! - Redo reapplies the original mutations
//! - New mutations clear the redo stack
//! - The tracker is dirty whenever the history position differs from the
//!   position of the last save; saving moves the baseline and keeps redo
//! - While locked, undo and redo are refused without touching the tree
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut tracker = ChangeTracker::new();
//! tracker.record(&mutation, &mut tree)?;
//! assert!(tracker.is_dirty());
//!
//! tracker.undo(&mut tree)?;
//! tracker.mark_saved();
//! ```

use crate::mutations::{Mutation, MutationError};
use hierarchy_document::HierarchyTree;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("History is locked while the document is not editable")]
    Locked,

    #[error("History replay failed: {0}")]
    Replay(#[from] MutationError),
}

/// A group of mutations that are undone/redone together
#[derive(Debug, Clone)]
pub struct MutationBatch {
    /// The mutations in this batch (in application order)
    pub mutations: Vec<Mutation>,

    /// The inverse mutations (in reverse order for undo)
    pub inverses: Vec<Mutation>,

    pub description: Option<String>,
}

impl MutationBatch {
    pub fn single(mutation: Mutation, inverse: Mutation) -> Self {
        Self {
            mutations: vec![mutation],
            inverses: vec![inverse],
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Undo/redo history with a dirty flag
#[derive(Debug)]
pub struct ChangeTracker {
    /// Applied batches (most recent last)
    undo_stack: Vec<MutationBatch>,

    /// Undone batches (most recent last)
    redo_stack: Vec<MutationBatch>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    current_batch: Option<MutationBatch>,

    /// Undo depth at the last save, `None` once that point has been
    /// discarded from history
    saved_level: Option<usize>,

    locked: bool,
}

impl ChangeTracker {
    /// Tracker with the default depth of 100
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
            saved_level: Some(0),
            locked: false,
        }
    }

    /// Apply a mutation and record it for undo. The tree is untouched when
    /// the mutation is rejected.
    pub fn record(&mut self, mutation: &Mutation, tree: &mut HierarchyTree) -> Result<(), MutationError> {
        let inverse = mutation.to_inverse(tree)?;
        mutation.apply(tree)?;

        if let Some(batch) = &mut self.current_batch {
            batch.mutations.push(mutation.clone());
            batch.inverses.insert(0, inverse);
        } else {
            self.push_batch(MutationBatch::single(mutation.clone(), inverse));
        }

        debug!(mutation = mutation.name(), levels = self.undo_stack.len(), "Recorded mutation");
        Ok(())
    }

    /// Start a batch of mutations that will be undone/redone together
    pub fn begin_batch(&mut self) {
        self.current_batch = Some(MutationBatch {
            mutations: Vec::new(),
            inverses: Vec::new(),
            description: None,
        });
    }

    /// End the current batch and push it onto the undo stack
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.mutations.is_empty() {
                self.push_batch(batch);
            }
        }
    }

    /// Undo the pending batch, if one is open, and close it
    pub fn abort_batch(&mut self, tree: &mut HierarchyTree) -> Result<(), HistoryError> {
        if let Some(batch) = self.current_batch.take() {
            for inverse in &batch.inverses {
                inverse.apply(tree)?;
            }
        }
        Ok(())
    }

    pub fn in_batch(&self) -> bool {
        self.current_batch.is_some()
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    fn push_batch(&mut self, batch: MutationBatch) {
        // A saved point on the discarded redo branch can never be reached again.
        if self.saved_level.map_or(false, |level| level > self.undo_stack.len()) {
            self.saved_level = None;
        }
        self.redo_stack.clear();
        self.undo_stack.push(batch);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
            self.saved_level = self.saved_level.and_then(|level| level.checked_sub(1));
        }
    }

    /// Undo the most recent batch. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, tree: &mut HierarchyTree) -> Result<bool, HistoryError> {
        if self.locked {
            return Err(HistoryError::Locked);
        }
        self.end_batch();

        let Some(batch) = self.undo_stack.pop() else {
            return Ok(false);
        };
        for inverse in &batch.inverses {
            inverse.apply(tree)?;
        }
        self.redo_stack.push(batch);
        Ok(true)
    }

    /// Redo the most recently undone batch. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, tree: &mut HierarchyTree) -> Result<bool, HistoryError> {
        if self.locked {
            return Err(HistoryError::Locked);
        }

        let Some(batch) = self.redo_stack.pop() else {
            return Ok(false);
        };
        for mutation in &batch.mutations {
            mutation.apply(tree)?;
        }
        self.undo_stack.push(batch);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether the tree differs from what was last saved or imported.
    /// Edits in an open batch count even before the batch is closed.
    pub fn is_dirty(&self) -> bool {
        let pending = self
            .current_batch
            .as_ref()
            .map_or(false, |batch| !batch.mutations.is_empty());
        pending || self.saved_level != Some(self.undo_stack.len())
    }

    /// Move the saved baseline to the current position; redo stays available
    pub fn mark_saved(&mut self) {
        self.end_batch();
        self.saved_level = Some(self.undo_stack.len());
    }

    /// Drop all history; the current tree becomes the clean baseline
    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.saved_level = Some(0);
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

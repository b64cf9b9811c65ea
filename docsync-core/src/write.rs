//! Outcomes of removals and bulk writes.

use crate::error::DocumentStoreError;

/// The outcome of a committed removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveResult {
    /// The identifier of the removed document.
    pub removed_id: String,
    /// Always `true` for a committed removal; a reverted one is an error instead.
    pub acknowledged: bool,
}

impl RemoveResult {
    pub fn new(removed_id: impl Into<String>) -> Self {
        Self {
            removed_id: removed_id.into(),
            acknowledged: true,
        }
    }
}

/// The outcome of `update_many` or `remove_many`.
///
/// Each target commits or reverts on its own, so a bulk write can partially succeed.
#[derive(Debug, Clone)]
pub struct BulkWriteResult<T> {
    /// Results of the targets that committed, in store order.
    pub committed: Vec<T>,
    /// Targets that failed, with the error each one produced.
    pub failed: Vec<(String, DocumentStoreError)>,
}

impl<T> BulkWriteResult<T> {
    pub fn new() -> Self {
        Self {
            committed: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Records the outcome for one target.
    pub fn push(&mut self, id: impl Into<String>, outcome: Result<T, DocumentStoreError>) {
        match outcome {
            Ok(value) => self.committed.push(value),
            Err(err) => self.failed.push((id.into(), err)),
        }
    }

    /// Returns `true` if every target committed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns the number of targets that were attempted.
    pub fn attempted(&self) -> usize {
        self.committed.len() + self.failed.len()
    }
}

impl<T> Default for BulkWriteResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

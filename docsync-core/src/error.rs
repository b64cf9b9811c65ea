//! Error types and result types for collection operations.
//!
//! Errors come in two disjoint families. Validation errors are raised before a write
//! touches any state, so there is nothing to revert. Synchronization errors are raised
//! only after an optimistic write was applied, rejected by its synchronizer, and
//! reverted. Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use std::{error::Error as StdError, sync::Arc};

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::sync::WriteOp;

/// Boxed error returned by synchronizers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared cause of a failed synchronization.
///
/// The same cause is handed to every `syncError` listener and to the caller, so it is
/// reference counted rather than boxed.
pub type SyncCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors that can occur when interacting with a collection.
#[derive(Error, Debug, Clone)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between typed documents and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error while building a collection.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A write was given an empty or otherwise unusable document identifier.
    #[error("Invalid document id: {0:?}")]
    InvalidId(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection is not registered.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A collection with the same name is already registered.
    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),
    /// The payload, patch or bulk-loaded document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The where-clause could not be built, e.g. a malformed regular expression.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An optimistic write was rejected by its synchronizer and reverted.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl DocumentStoreError {
    /// Returns `true` for errors raised before any state was mutated.
    pub fn is_validation(&self) -> bool {
        !self.is_sync()
    }

    /// Returns `true` if an optimistic write was reverted.
    pub fn is_sync(&self) -> bool {
        matches!(self, DocumentStoreError::Sync(_))
    }

    /// Returns the synchronization details if this is a synchronization error.
    pub fn as_sync(&self) -> Option<&SyncError> {
        match self {
            DocumentStoreError::Sync(err) => Some(err),
            _ => None,
        }
    }
}

/// A reverted write.
///
/// `op` is a stable tag callers can match on; `cause` is whatever the synchronizer
/// failed with, or [`SyncRejected`] if it merely returned `false`.
#[derive(Error, Debug, Clone)]
#[error("{op} synchronization failed for document {id}: {cause}")]
pub struct SyncError {
    /// The write that was reverted.
    pub op: WriteOp,
    /// The affected document.
    pub id: String,
    /// The underlying failure.
    #[source]
    pub cause: SyncCause,
}

/// Cause synthesized when a synchronizer resolves to `false` without an error of its own.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("synchronizer rejected the {0} operation")]
pub struct SyncRejected(pub WriteOp);

/// A specialized `Result` type for collection operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

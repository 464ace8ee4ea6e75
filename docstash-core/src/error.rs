//! Error types and result types for document store operations.
//!
//! This module provides error handling for every database, collection, hook and storage
//! operation. Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Boxed error type returned by hook handlers.
///
/// Any error implementing [`std::error::Error`] can be propagated out of a handler with `?`,
/// and plain strings convert with `.into()`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// The variants fall into four kinds: validation failures (detected before any mutation),
/// not-found failures, hook pipeline failures and storage failures.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A name, query, document, patch, identifier or cursor option is malformed.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the database snapshot.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A hook handler signaled failure.
    ///
    /// Failures raised during the `post` phase are reported after the mutation has
    /// already been persisted; the mutation is not rolled back.
    #[error("Hook {phase}:{event} failed: {source}")]
    Pipeline {
        /// The phase the failing handler was registered for (`pre` or `post`).
        phase: String,
        /// The event the failing handler was registered for.
        event: String,
        /// The error returned by the handler.
        #[source]
        source: BoxError,
    },
    /// The key/value collaborator failed to read or write, or the database blob is absent.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Serialization/deserialization error when converting a database snapshot.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DocumentStoreError {
    /// Returns `true` for [`DocumentStoreError::Validation`].
    pub fn is_validation(&self) -> bool {
        matches!(self, DocumentStoreError::Validation(_))
    }

    /// Returns `true` for missing documents or collections.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::CollectionNotFound(_)
        )
    }

    /// Returns `true` for [`DocumentStoreError::Pipeline`].
    pub fn is_pipeline(&self) -> bool {
        matches!(self, DocumentStoreError::Pipeline { .. })
    }

    /// Returns `true` for [`DocumentStoreError::Storage`].
    pub fn is_storage(&self) -> bool {
        matches!(self, DocumentStoreError::Storage(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DocumentStoreError::Validation(message.into())
    }
}

/// A specialized `Result` type for document store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentStoreError`].
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

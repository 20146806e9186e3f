//! Dispatch error taxonomy.
//!
//! Routing and addressing errors (`MalformedLocator`, `UnknownLocator`,
//! `UnknownRoute`, `HandlerNotFound`) are caller-contract or internal
//! invariant violations and propagate uncaught. Storage-collaborator
//! failures pass through unwrapped via the `Storage` variant. An absent
//! storage handle is not an error: reads degrade to empty results and
//! writes to zero/absent results.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for dispatch and handler operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatch layer errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Locator could not be parsed, or its row-id segment is missing or
    /// non-numeric
    #[error("malformed locator: {0}")]
    MalformedLocator(String),

    /// Locator matches no registered pattern
    #[error("unknown locator: {0}")]
    UnknownLocator(String),

    /// A match code reached a handler that recognizes neither its item nor
    /// its collection code
    #[error("unknown route for match code {0:#x}")]
    UnknownRoute(u32),

    /// A selector was extracted that no registered handler owns. This is an
    /// internal registration bug, not a caller error.
    #[error("no handler registered for selector {0:#x}")]
    HandlerNotFound(u32),

    /// A requested projection column is not part of the table's column set
    #[error("unknown column in projection: {0}")]
    UnknownColumn(String),

    /// The storage engine reported that no row was created
    #[error("failed to insert row into {0}")]
    InsertFailed(String),

    /// Storage engine failure, passed through unwrapped
    #[error(transparent)]
    Storage(#[from] StorageError),
}

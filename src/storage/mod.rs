//! Storage-handle contract.
//!
//! The relational engine is an external collaborator consumed through the
//! [`StorageEngine`] trait. One shared handle serves reads and writes; the
//! engine is responsible for serializing its own access, so this layer adds
//! no locking. Until a handle is injected, handlers treat every data
//! operation as "no data".

mod memory;

pub use memory::MemoryEngine;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::locator::Locator;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage engine failures, surfaced to callers unwrapped.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Engine rejected or failed a statement
    #[error("storage engine error: {0}")]
    Engine(String),

    /// Statement referenced a table the engine does not have
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// Predicate is outside the grammar the engine supports
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),
}

/// A set of column values, for inserts, updates and result rows.
pub type Values = BTreeMap<String, Value>;

/// Query result: rows plus the locator the caller should watch for changes.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    /// Result rows in engine order
    pub rows: Vec<Values>,

    /// Locator whose change notifications cover this result; set on
    /// successful queries, absent when the storage handle is not yet
    /// injected
    pub notification_locator: Option<Locator>,
}

impl RowSet {
    /// An empty result with no notification wiring.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of result rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Narrow contract to the relational storage engine.
///
/// `predicate` is an opaque SQL-style condition (`name=? AND (_id=7)`);
/// `args` binds its `?` placeholders positionally.
pub trait StorageEngine: Send + Sync {
    /// Executes a raw schema statement.
    fn execute(&self, sql: &str) -> StorageResult<()>;

    /// Selects `columns` from `table` under `predicate`, ordered by
    /// `order_by`.
    fn select(
        &self,
        table: &str,
        columns: &[String],
        predicate: Option<&str>,
        args: &[Value],
        order_by: Option<&str>,
    ) -> StorageResult<Vec<Values>>;

    /// Inserts a row, returning its row id. A result `<= 0` means no row
    /// was created.
    fn insert(&self, table: &str, values: &Values) -> StorageResult<i64>;

    /// Updates rows matching `predicate`, returning the affected count.
    fn update(
        &self,
        table: &str,
        values: &Values,
        predicate: Option<&str>,
        args: &[Value],
    ) -> StorageResult<usize>;

    /// Deletes rows matching `predicate`, returning the affected count.
    fn delete(&self, table: &str, predicate: Option<&str>, args: &[Value])
        -> StorageResult<usize>;
}

/// Shared, externally-owned storage handle, injected once after router
/// construction.
pub type SharedEngine = Arc<dyn StorageEngine>;

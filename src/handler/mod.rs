//! Table handlers.
//!
//! A table handler owns one table's declaration and implements CRUD against
//! the shared storage handle. Routers hold handlers behind the
//! [`TableHandler`] trait only, so new table types slot in without touching
//! router logic.

mod sql;

pub use sql::{SqlTableHandler, UpgradePolicy};

use serde_json::Value;

use crate::config::TableConfig;
use crate::errors::DispatchResult;
use crate::locator::Locator;
use crate::matcher::LocatorMatcher;
use crate::notify::ChangeNotifier;
use crate::storage::{RowSet, SharedEngine, StorageEngine, StorageResult, Values};

/// The two operation shapes a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// A single item, addressed by trailing row id
    Item,
    /// The whole item collection
    Collection,
}

/// Capability contract between routers and per-table logic.
///
/// Handler-local match codes identify item vs collection routes; in
/// multi-table mode the router ORs a selector into them at registration and
/// strips it again before delegating, so implementations only ever see their
/// own two codes.
pub trait TableHandler: Send + Sync {
    /// The table declaration this handler serves.
    fn config(&self) -> &TableConfig;

    /// Returns the handler-local match code for `kind`. Stable for the
    /// handler's lifetime.
    fn match_code(&self, kind: RouteKind) -> u32;

    /// Registers the collection and item patterns under `authority`, each
    /// tagged with the local code ORed with `selector`.
    fn register_routes(&self, matcher: &mut LocatorMatcher, authority: &str, selector: u32) {
        let config = self.config();
        matcher.register(
            authority,
            &config.collection_segment,
            self.match_code(RouteKind::Collection) | selector,
        );
        matcher.register(
            authority,
            &format!("{}/#", config.collection_segment),
            self.match_code(RouteKind::Item) | selector,
        );
    }

    /// Content type for `local_code`, or `None` when the code is neither
    /// the item nor the collection code. Lookup only, never an error.
    fn content_type(&self, local_code: u32) -> Option<&str>;

    /// Injects the shared storage handle. Supplied once after construction;
    /// until then every data operation behaves as "no data".
    fn attach_storage(&self, engine: SharedEngine);

    /// Creates this handler's schema.
    fn on_create_storage(&self, engine: &dyn StorageEngine) -> StorageResult<()>;

    /// Upgrades this handler's schema between versions.
    ///
    /// The default policy is destructive: drop the table and recreate it.
    fn on_upgrade_storage(
        &self,
        engine: &dyn StorageEngine,
        old_version: u32,
        new_version: u32,
    ) -> StorageResult<()> {
        let _ = (old_version, new_version);
        engine.execute(&format!(
            "DROP TABLE IF EXISTS {}",
            self.config().table_name
        ))?;
        self.on_create_storage(engine)
    }

    /// Queries the collection, or a single item when `local_code` is the
    /// item code. A successful result carries the request locator as its
    /// notification locator.
    fn query(
        &self,
        local_code: u32,
        locator: &Locator,
        projection: &[String],
        filter: Option<&str>,
        filter_args: &[Value],
        sort_order: Option<&str>,
    ) -> DispatchResult<RowSet>;

    /// Inserts a row, returning the new item's locator and notifying it.
    /// Returns `Ok(None)` while the storage handle is absent.
    fn insert(
        &self,
        local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        values: &Values,
    ) -> DispatchResult<Option<Locator>>;

    /// Deletes matching rows, notifying the request locator on success even
    /// when the count is zero.
    fn delete(
        &self,
        local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize>;

    /// Updates matching rows, notifying the request locator on success even
    /// when the count is zero.
    fn update(
        &self,
        local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        values: &Values,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize>;
}

//! Generic SQL table handler.
//!
//! [`SqlTableHandler`] implements [`TableHandler`] for any table that fits
//! the standard shape: a `_id` row-id column, one collection route and one
//! item route. Handlers with richer needs implement the trait themselves.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::Value;

use super::{RouteKind, TableHandler};
use crate::config::TableConfig;
use crate::errors::{DispatchError, DispatchResult};
use crate::locator::Locator;
use crate::notify::ChangeNotifier;
use crate::storage::{RowSet, SharedEngine, StorageEngine, StorageResult, Values};

/// How a handler reacts to a schema version bump.
pub enum UpgradePolicy {
    /// Drop the table and recreate it. Loses data.
    Recreate,
    /// Handler-supplied migration.
    Custom(Box<dyn Fn(&dyn StorageEngine, u32, u32) -> StorageResult<()> + Send + Sync>),
}

/// Instance-scoped match-code source. Never static: two coexisting handlers
/// of the same table type must not interfere.
#[derive(Debug, Default)]
struct CodeGenerator {
    next: u32,
}

impl CodeGenerator {
    fn generate(&mut self) -> u32 {
        let code = self.next;
        self.next += 1;
        code
    }
}

/// Table handler backed by a `CREATE TABLE` statement and the shared
/// storage handle.
pub struct SqlTableHandler {
    config: TableConfig,
    projection_map: BTreeMap<String, String>,
    code_item: u32,
    code_collection: u32,
    create_sql: String,
    upgrade_policy: UpgradePolicy,
    engine: OnceLock<SharedEngine>,
}

impl SqlTableHandler {
    /// Creates a handler for `config`, creating its schema with
    /// `create_sql`.
    pub fn new(config: TableConfig, create_sql: impl Into<String>) -> Self {
        let mut codes = CodeGenerator::default();
        let code_item = codes.generate();
        let code_collection = codes.generate();
        let projection_map = config.projection_map();

        Self {
            config,
            projection_map,
            code_item,
            code_collection,
            create_sql: create_sql.into(),
            upgrade_policy: UpgradePolicy::Recreate,
            engine: OnceLock::new(),
        }
    }

    /// Replaces the destructive default upgrade policy.
    pub fn with_upgrade_policy(mut self, policy: UpgradePolicy) -> Self {
        self.upgrade_policy = policy;
        self
    }

    fn engine(&self) -> Option<&SharedEngine> {
        self.engine.get()
    }

    /// Maps the requested projection through the identity projection map.
    /// An empty projection selects the full configured column list.
    fn map_projection(&self, projection: &[String]) -> DispatchResult<Vec<String>> {
        if projection.is_empty() {
            return Ok(self
                .config
                .columns
                .iter()
                .filter(|column| !column.trim().is_empty())
                .cloned()
                .collect());
        }
        projection
            .iter()
            .map(|column| {
                self.projection_map
                    .get(column)
                    .cloned()
                    .ok_or_else(|| DispatchError::UnknownColumn(column.clone()))
            })
            .collect()
    }

    /// Scopes the caller filter to `local_code`: collection passes it
    /// through, item ANDs an exact-row-id predicate onto it.
    fn scoped_filter(
        &self,
        local_code: u32,
        locator: &Locator,
        filter: Option<&str>,
    ) -> DispatchResult<Option<String>> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());

        if local_code == self.code_collection {
            Ok(filter.map(str::to_string))
        } else if local_code == self.code_item {
            Ok(Some(append_row_id(filter, locator.row_id()?)))
        } else {
            Err(DispatchError::UnknownRoute(local_code))
        }
    }
}

impl TableHandler for SqlTableHandler {
    fn config(&self) -> &TableConfig {
        &self.config
    }

    fn match_code(&self, kind: RouteKind) -> u32 {
        match kind {
            RouteKind::Item => self.code_item,
            RouteKind::Collection => self.code_collection,
        }
    }

    fn content_type(&self, local_code: u32) -> Option<&str> {
        if local_code == self.code_collection {
            Some(&self.config.content_type)
        } else if local_code == self.code_item {
            Some(&self.config.content_item_type)
        } else {
            None
        }
    }

    fn attach_storage(&self, engine: SharedEngine) {
        if self.engine.set(engine).is_err() {
            tracing::debug!(
                table = %self.config.table_name,
                "storage handle already attached, keeping the first"
            );
        }
    }

    fn on_create_storage(&self, engine: &dyn StorageEngine) -> StorageResult<()> {
        engine.execute(&self.create_sql)
    }

    fn on_upgrade_storage(
        &self,
        engine: &dyn StorageEngine,
        old_version: u32,
        new_version: u32,
    ) -> StorageResult<()> {
        match &self.upgrade_policy {
            UpgradePolicy::Recreate => {
                tracing::debug!(
                    table = %self.config.table_name,
                    old_version,
                    new_version,
                    "recreating table on upgrade"
                );
                engine.execute(&format!(
                    "DROP TABLE IF EXISTS {}",
                    self.config.table_name
                ))?;
                self.on_create_storage(engine)
            }
            UpgradePolicy::Custom(upgrade) => upgrade(engine, old_version, new_version),
        }
    }

    fn query(
        &self,
        local_code: u32,
        locator: &Locator,
        projection: &[String],
        filter: Option<&str>,
        filter_args: &[Value],
        sort_order: Option<&str>,
    ) -> DispatchResult<RowSet> {
        // Routing errors surface even before the handle is injected.
        let effective_filter = self.scoped_filter(local_code, locator, filter)?;
        let columns = self.map_projection(projection)?;

        let engine = match self.engine() {
            Some(engine) => engine,
            None => return Ok(RowSet::empty()),
        };
        let sort = sort_order
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.config.default_sort_order.as_str());

        let rows = engine.select(
            &self.config.table_name,
            &columns,
            effective_filter.as_deref(),
            filter_args,
            Some(sort),
        )?;
        tracing::debug!(
            table = %self.config.table_name,
            rows = rows.len(),
            "query complete"
        );

        Ok(RowSet {
            rows,
            notification_locator: Some(locator.clone()),
        })
    }

    fn insert(
        &self,
        _local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        values: &Values,
    ) -> DispatchResult<Option<Locator>> {
        let engine = match self.engine() {
            Some(engine) => engine,
            None => return Ok(None),
        };

        let row_id = if values.is_empty() {
            let mut placeholder = Values::new();
            placeholder.insert(self.config.placeholder_column.clone(), Value::Null);
            engine.insert(&self.config.table_name, &placeholder)?
        } else {
            engine.insert(&self.config.table_name, values)?
        };

        if row_id <= 0 {
            return Err(DispatchError::InsertFailed(locator.to_string()));
        }
        let item_locator = self.config.collection_locator.with_appended_id(row_id);
        tracing::debug!(table = %self.config.table_name, row_id, "row inserted");
        notifier.notify_change(&item_locator);
        Ok(Some(item_locator))
    }

    fn delete(
        &self,
        local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize> {
        let effective_filter = self.scoped_filter(local_code, locator, filter)?;

        let engine = match self.engine() {
            Some(engine) => engine,
            None => return Ok(0),
        };
        let count = engine.delete(
            &self.config.table_name,
            effective_filter.as_deref(),
            filter_args,
        )?;
        tracing::debug!(table = %self.config.table_name, count, "rows deleted");

        // Notified even at zero affected rows; the request locator, not a
        // derived item locator.
        notifier.notify_change(locator);
        Ok(count)
    }

    fn update(
        &self,
        local_code: u32,
        notifier: &dyn ChangeNotifier,
        locator: &Locator,
        values: &Values,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize> {
        let effective_filter = self.scoped_filter(local_code, locator, filter)?;

        let engine = match self.engine() {
            Some(engine) => engine,
            None => return Ok(0),
        };
        let count = engine.update(
            &self.config.table_name,
            values,
            effective_filter.as_deref(),
            filter_args,
        )?;
        tracing::debug!(table = %self.config.table_name, count, "rows updated");

        notifier.notify_change(locator);
        Ok(count)
    }
}

/// ANDs an exact-row-id predicate onto a caller filter.
fn append_row_id(filter: Option<&str>, row_id: i64) -> String {
    match filter {
        Some(filter) => format!("{} AND (_id={})", filter, row_id),
        None => format!("(_id={})", row_id),
    }
}

//! Single-table dispatch router.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ProviderConfig;
use crate::errors::{DispatchError, DispatchResult};
use crate::handler::TableHandler;
use crate::locator::Locator;
use crate::matcher::LocatorMatcher;
use crate::notify::{ChangeNotifier, NoopNotifier};
use crate::storage::{RowSet, SharedEngine, StorageEngine, StorageResult, Values};

/// Thin pass-through router over exactly one table handler.
///
/// Single-table mode has no selector space: the handler's routes register
/// at selector 0 and raw match codes delegate unmasked.
pub struct TableRouter {
    config: ProviderConfig,
    matcher: LocatorMatcher,
    handler: Box<dyn TableHandler>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl TableRouter {
    /// Builds the router and registers the handler's routes under the
    /// configured authority.
    pub fn new(config: ProviderConfig, handler: Box<dyn TableHandler>) -> Self {
        let mut matcher = LocatorMatcher::new();
        handler.register_routes(&mut matcher, &config.authority, 0);

        Self {
            config,
            matcher,
            handler,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Replaces the default no-op change notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The provider declaration this router serves.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn resolve(&self, locator: &Locator) -> DispatchResult<u32> {
        self.matcher
            .resolve(locator)
            .ok_or_else(|| DispatchError::UnknownLocator(locator.to_string()))
    }

    /// Content type of the route `locator` addresses.
    pub fn content_type(&self, locator: &Locator) -> DispatchResult<String> {
        let code = self.resolve(locator)?;
        self.handler
            .content_type(code)
            .map(str::to_string)
            .ok_or_else(|| DispatchError::UnknownLocator(locator.to_string()))
    }

    /// Queries the route `locator` addresses. An unmatched locator yields
    /// an empty result, not an error: reads degrade gracefully.
    pub fn query(
        &self,
        locator: &Locator,
        projection: &[String],
        filter: Option<&str>,
        filter_args: &[Value],
        sort_order: Option<&str>,
    ) -> DispatchResult<RowSet> {
        let code = match self.matcher.resolve(locator) {
            Some(code) => code,
            None => {
                tracing::debug!(locator = %locator, "no route matched, returning empty result");
                return Ok(RowSet::empty());
            }
        };
        self.handler
            .query(code, locator, projection, filter, filter_args, sort_order)
    }

    /// Inserts under the route `locator` addresses.
    pub fn insert(&self, locator: &Locator, values: &Values) -> DispatchResult<Option<Locator>> {
        let code = self.resolve(locator)?;
        self.handler
            .insert(code, self.notifier.as_ref(), locator, values)
    }

    /// Deletes under the route `locator` addresses.
    pub fn delete(
        &self,
        locator: &Locator,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize> {
        let code = self.resolve(locator)?;
        self.handler
            .delete(code, self.notifier.as_ref(), locator, filter, filter_args)
    }

    /// Updates under the route `locator` addresses.
    pub fn update(
        &self,
        locator: &Locator,
        values: &Values,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize> {
        let code = self.resolve(locator)?;
        self.handler.update(
            code,
            self.notifier.as_ref(),
            locator,
            values,
            filter,
            filter_args,
        )
    }

    /// Injects the shared storage handle into the handler.
    pub fn attach_storage(&self, engine: SharedEngine) {
        self.handler.attach_storage(engine);
    }

    /// Creates the handler's schema.
    pub fn on_create_storage(&self, engine: &dyn StorageEngine) -> StorageResult<()> {
        self.handler.on_create_storage(engine)
    }

    /// Upgrades the handler's schema.
    pub fn on_upgrade_storage(
        &self,
        engine: &dyn StorageEngine,
        old_version: u32,
        new_version: u32,
    ) -> StorageResult<()> {
        self.handler
            .on_upgrade_storage(engine, old_version, new_version)
    }
}

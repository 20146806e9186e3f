//! Multi-table dispatch router.

use std::sync::Arc;

use serde_json::Value;

use super::{LOCAL_MASK, SELECTOR_MASK, SELECTOR_STRIDE};
use crate::config::ProviderConfig;
use crate::errors::{DispatchError, DispatchResult};
use crate::handler::TableHandler;
use crate::locator::Locator;
use crate::matcher::LocatorMatcher;
use crate::notify::{ChangeNotifier, NoopNotifier};
use crate::storage::{RowSet, SharedEngine, StorageEngine, StorageResult, Values};

/// Router owning N table handlers behind one authority.
///
/// Each handler gets a disjoint selector slice of the match-code space at
/// registration; dispatch strips the selector from the resolved code to
/// find the owning handler and hands it the local code.
pub struct MultiTableRouter {
    config: ProviderConfig,
    matcher: LocatorMatcher,
    /// Ordered `(selector, handler)` registry; iteration order is
    /// registration order, which fan-out operations preserve.
    registry: Vec<(u32, Box<dyn TableHandler>)>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl MultiTableRouter {
    /// Builds the router from `handlers` in caller-supplied order.
    ///
    /// `None` entries are skipped; the k-th surviving handler is assigned
    /// selector `k * SELECTOR_STRIDE` and registers its routes under the
    /// configured authority with that selector ORed in.
    pub fn new(config: ProviderConfig, handlers: Vec<Option<Box<dyn TableHandler>>>) -> Self {
        let mut matcher = LocatorMatcher::new();
        let mut registry: Vec<(u32, Box<dyn TableHandler>)> = Vec::new();

        for handler in handlers.into_iter().flatten() {
            // One stride slice per handler; past the last slice the
            // multiplication would wrap and collide selectors.
            debug_assert!(
                registry.len() <= (SELECTOR_MASK / SELECTOR_STRIDE) as usize,
                "selector space exhausted: {} handlers registered",
                registry.len()
            );
            let selector = registry.len() as u32 * SELECTOR_STRIDE;
            handler.register_routes(&mut matcher, &config.authority, selector);
            registry.push((selector, handler));
        }
        tracing::debug!(
            authority = %config.authority,
            handlers = registry.len(),
            "multi-table router built"
        );

        Self {
            config,
            matcher,
            registry,
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

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    fn resolve(&self, locator: &Locator) -> DispatchResult<u32> {
        self.matcher
            .resolve(locator)
            .ok_or_else(|| DispatchError::UnknownLocator(locator.to_string()))
    }

    /// Splits a raw match code into its owning handler and local code.
    ///
    /// A selector with no registered owner is an internal registration bug,
    /// surfaced as `HandlerNotFound`.
    fn delegate(&self, match_code: u32) -> DispatchResult<(&dyn TableHandler, u32)> {
        let selector = match_code & SELECTOR_MASK;
        let local_code = match_code & LOCAL_MASK;

        let handler = self
            .registry
            .iter()
            .find(|(owned, _)| *owned == selector)
            .map(|(_, handler)| handler.as_ref())
            .ok_or_else(|| {
                tracing::warn!(selector, match_code, "no handler owns selector");
                DispatchError::HandlerNotFound(selector)
            })?;
        Ok((handler, local_code))
    }

    /// Content type of the route `locator` addresses.
    pub fn content_type(&self, locator: &Locator) -> DispatchResult<String> {
        let code = self.resolve(locator)?;
        let (handler, local_code) = self.delegate(code)?;
        handler
            .content_type(local_code)
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
        let (handler, local_code) = self.delegate(code)?;
        handler.query(
            local_code,
            locator,
            projection,
            filter,
            filter_args,
            sort_order,
        )
    }

    /// Inserts under the route `locator` addresses.
    pub fn insert(&self, locator: &Locator, values: &Values) -> DispatchResult<Option<Locator>> {
        let code = self.resolve(locator)?;
        let (handler, local_code) = self.delegate(code)?;
        handler.insert(local_code, self.notifier.as_ref(), locator, values)
    }

    /// Deletes under the route `locator` addresses.
    pub fn delete(
        &self,
        locator: &Locator,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> DispatchResult<usize> {
        let code = self.resolve(locator)?;
        let (handler, local_code) = self.delegate(code)?;
        handler.delete(
            local_code,
            self.notifier.as_ref(),
            locator,
            filter,
            filter_args,
        )
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
        let (handler, local_code) = self.delegate(code)?;
        handler.update(
            local_code,
            self.notifier.as_ref(),
            locator,
            values,
            filter,
            filter_args,
        )
    }

    /// Injects the shared storage handle into every handler, in
    /// registration order.
    pub fn attach_storage(&self, engine: SharedEngine) {
        for (_, handler) in &self.registry {
            handler.attach_storage(engine.clone());
        }
    }

    /// Creates every handler's schema, in registration order. The first
    /// failure aborts the remaining fan-out and propagates.
    pub fn on_create_storage(&self, engine: &dyn StorageEngine) -> StorageResult<()> {
        for (_, handler) in &self.registry {
            handler.on_create_storage(engine)?;
        }
        Ok(())
    }

    /// Upgrades every handler's schema, in registration order. The first
    /// failure aborts the remaining fan-out and propagates; earlier
    /// handlers' upgrades are not rolled back.
    pub fn on_upgrade_storage(
        &self,
        engine: &dyn StorageEngine,
        old_version: u32,
        new_version: u32,
    ) -> StorageResult<()> {
        for (_, handler) in &self.registry {
            handler.on_upgrade_storage(engine, old_version, new_version)?;
        }
        Ok(())
    }
}

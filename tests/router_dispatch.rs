//! Dispatch invariant tests.
//!
//! Proves the routing properties end to end over the in-memory engine:
//! selector assignment, selector/local round-trips, item-scoped
//! predicates, cross-table isolation, and the query-degrades /
//! writes-raise split for unmatched locators.

use std::sync::Arc;

use serde_json::json;

use tableroute::config::{ProviderConfig, TableConfig};
use tableroute::errors::DispatchError;
use tableroute::handler::{RouteKind, SqlTableHandler, TableHandler};
use tableroute::locator::Locator;
use tableroute::notify::MemoryNotifier;
use tableroute::router::{MultiTableRouter, TableRouter, LOCAL_MASK, SELECTOR_MASK, SELECTOR_STRIDE};
use tableroute::storage::{MemoryEngine, Values};

// =========================================================================
// Fixtures
// =========================================================================

fn table_config(segment: &str) -> TableConfig {
    TableConfig {
        table_name: segment.to_string(),
        default_sort_order: "_id ASC".to_string(),
        collection_locator: Locator::parse(&format!("app.provider/{}", segment)).unwrap(),
        content_type: format!("vnd.tableroute.dir/{}", segment),
        content_item_type: format!("vnd.tableroute.item/{}", segment),
        placeholder_column: "title".to_string(),
        columns: vec!["_id".to_string(), "title".to_string(), "body".to_string()],
        collection_segment: segment.to_string(),
    }
}

fn table_handler(segment: &str) -> Box<dyn TableHandler> {
    Box::new(SqlTableHandler::new(
        table_config(segment),
        format!(
            "CREATE TABLE {} (_id INTEGER PRIMARY KEY, title TEXT, body TEXT)",
            segment
        ),
    ))
}

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        authority: "app.provider".to_string(),
        database_name: "app.db".to_string(),
        database_version: 1,
    }
}

fn operational_router(segments: &[&str]) -> (MultiTableRouter, Arc<MemoryEngine>, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let router = MultiTableRouter::new(
        provider_config(),
        segments.iter().map(|segment| Some(table_handler(segment))).collect(),
    )
    .with_notifier(notifier.clone());

    let engine = Arc::new(MemoryEngine::new());
    router.on_create_storage(engine.as_ref()).unwrap();
    router.attach_storage(engine.clone());
    (router, engine, notifier)
}

fn locator(raw: &str) -> Locator {
    Locator::parse(raw).unwrap()
}

fn title_values(title: &str) -> Values {
    let mut values = Values::new();
    values.insert("title".to_string(), json!(title));
    values
}

// =========================================================================
// Selector assignment
// =========================================================================

#[test]
fn test_selectors_are_stride_multiples_in_registration_order() {
    let config = provider_config();
    let mut matcher = tableroute::matcher::LocatorMatcher::new();
    let handlers = [table_handler("notes"), table_handler("tags"), table_handler("folders")];

    // Registration the way the multi-table router performs it.
    for (position, handler) in handlers.iter().enumerate() {
        handler.register_routes(&mut matcher, &config.authority, position as u32 * SELECTOR_STRIDE);
    }

    let mut selectors = Vec::new();
    for segment in ["notes", "tags", "folders"] {
        let code = matcher
            .resolve(&locator(&format!("app.provider/{}", segment)))
            .unwrap();
        selectors.push(code & SELECTOR_MASK);
    }
    assert_eq!(selectors, vec![0, SELECTOR_STRIDE, 2 * SELECTOR_STRIDE]);
}

#[test]
fn test_each_table_owns_its_selector_slice() {
    let (router, engine, _notifier) = operational_router(&["notes", "tags", "folders"]);
    assert_eq!(router.handler_count(), 3);

    for segment in ["notes", "tags", "folders"] {
        let collection = router
            .content_type(&locator(&format!("app.provider/{}", segment)))
            .unwrap();
        assert_eq!(collection, format!("vnd.tableroute.dir/{}", segment));

        router
            .insert(
                &locator(&format!("app.provider/{}", segment)),
                &title_values(segment),
            )
            .unwrap();
    }

    // Every insert landed in its own table only.
    for segment in ["notes", "tags", "folders"] {
        assert_eq!(engine.row_count(segment), 1);
    }
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "selector space exhausted")]
fn test_registration_beyond_selector_space_is_rejected() {
    // One slice per handler fits exactly SELECTOR_MASK / SELECTOR_STRIDE + 1
    // handlers; one more would wrap the selector arithmetic and collide.
    let capacity = (SELECTOR_MASK / SELECTOR_STRIDE) as usize + 1;
    let handlers = (0..=capacity)
        .map(|_| Some(table_handler("notes")))
        .collect();
    let _ = MultiTableRouter::new(provider_config(), handlers);
}

#[test]
fn test_null_handler_entries_are_skipped() {
    let handlers: Vec<Option<Box<dyn TableHandler>>> =
        vec![Some(table_handler("notes")), None, Some(table_handler("tags"))];
    let router = MultiTableRouter::new(provider_config(), handlers);

    assert_eq!(router.handler_count(), 2);

    // Both surviving handlers stay reachable: the gap left by the skipped
    // entry does not burn a selector.
    assert!(router.content_type(&locator("app.provider/notes")).is_ok());
    assert!(router.content_type(&locator("app.provider/tags")).is_ok());
}

#[test]
fn test_match_code_round_trip_recovers_standalone_local_code() {
    let config = provider_config();
    let mut matcher = tableroute::matcher::LocatorMatcher::new();

    let notes = table_handler("notes");
    let tags = table_handler("tags");
    notes.register_routes(&mut matcher, &config.authority, 0);
    tags.register_routes(&mut matcher, &config.authority, SELECTOR_STRIDE);

    let standalone = table_handler("tags");

    for (raw, kind) in [
        ("app.provider/tags", RouteKind::Collection),
        ("app.provider/tags/7", RouteKind::Item),
    ] {
        let code = matcher.resolve(&locator(raw)).unwrap();

        // Splitting and recombining loses nothing.
        assert_eq!((code & SELECTOR_MASK) | (code & LOCAL_MASK), code);
        assert_eq!(code & SELECTOR_MASK, SELECTOR_STRIDE);

        // The recovered local code equals what the handler generates on
        // its own.
        assert_eq!(code & LOCAL_MASK, standalone.match_code(kind));
    }
}

// =========================================================================
// End-to-end dispatch
// =========================================================================

#[test]
fn test_item_locator_routes_to_owning_handler_with_row_id_predicate() {
    let (router, engine, _notifier) = operational_router(&["notes", "tags"]);

    for n in 1..=7 {
        router
            .insert(
                &locator("app.provider/notes"),
                &title_values(&format!("note {}", n)),
            )
            .unwrap();
    }
    router
        .insert(&locator("app.provider/tags"), &title_values("urgent"))
        .unwrap();

    // Item locator: constrained to _id=7, notes handler only.
    let one = router
        .query(&locator("app.provider/notes/7"), &[], None, &[], None)
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one.rows[0].get("_id"), Some(&json!(7)));
    assert_eq!(one.rows[0].get("title"), Some(&json!("note 7")));

    // Collection locator: unconstrained.
    let all = router
        .query(&locator("app.provider/notes"), &[], None, &[], None)
        .unwrap();
    assert_eq!(all.len(), 7);

    // The tags table is untouched by notes traffic.
    assert_eq!(engine.row_count("tags"), 1);
}

#[test]
fn test_insert_returns_collection_locator_with_new_row_id() {
    let (router, _engine, notifier) = operational_router(&["notes"]);

    let first = router
        .insert(&locator("app.provider/notes"), &title_values("alpha"))
        .unwrap()
        .unwrap();
    let second = router
        .insert(&locator("app.provider/notes"), &Values::new())
        .unwrap()
        .unwrap();

    assert_eq!(first.to_string(), "app.provider/notes/1");
    assert_eq!(second.to_string(), "app.provider/notes/2");
    assert_eq!(
        notifier.notifications(),
        vec![
            locator("app.provider/notes/1"),
            locator("app.provider/notes/2"),
        ]
    );
}

#[test]
fn test_delete_via_item_locator_equals_collection_with_row_id_filter() {
    let (router, _engine, _notifier) = operational_router(&["notes", "tags"]);

    for title in ["alpha", "beta", "gamma"] {
        router
            .insert(&locator("app.provider/notes"), &title_values(title))
            .unwrap();
    }

    // Item form.
    let by_item = router
        .delete(&locator("app.provider/notes/2"), None, &[])
        .unwrap();

    // Equivalent collection form with the predicate spelled out.
    let by_filter = router
        .delete(&locator("app.provider/notes"), Some("(_id=3)"), &[])
        .unwrap();

    assert_eq!(by_item, 1);
    assert_eq!(by_filter, 1);

    let remaining = router
        .query(&locator("app.provider/notes"), &[], None, &[], None)
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.rows[0].get("title"), Some(&json!("alpha")));
}

#[test]
fn test_update_via_item_locator_ands_filter() {
    let (router, _engine, notifier) = operational_router(&["notes"]);

    for title in ["alpha", "alpha"] {
        router
            .insert(&locator("app.provider/notes"), &title_values(title))
            .unwrap();
    }

    // Caller filter matches both rows; the item scope restricts to row 2.
    let count = router
        .update(
            &locator("app.provider/notes/2"),
            &title_values("beta"),
            Some("title=?"),
            &[json!("alpha")],
        )
        .unwrap();
    assert_eq!(count, 1);

    let rows = router
        .query(&locator("app.provider/notes"), &[], None, &[], None)
        .unwrap();
    assert_eq!(rows.rows[0].get("title"), Some(&json!("alpha")));
    assert_eq!(rows.rows[1].get("title"), Some(&json!("beta")));

    // The write notified the original request locator, not a derived one.
    assert!(notifier
        .notifications()
        .contains(&locator("app.provider/notes/2")));
}

#[test]
fn test_query_result_carries_notification_locator() {
    let (router, _engine, _notifier) = operational_router(&["notes"]);

    let result = router
        .query(&locator("app.provider/notes"), &[], None, &[], None)
        .unwrap();
    assert_eq!(
        result.notification_locator,
        Some(locator("app.provider/notes"))
    );
}

#[test]
fn test_content_types_per_route_shape() {
    let (router, _engine, _notifier) = operational_router(&["notes", "tags"]);

    assert_eq!(
        router.content_type(&locator("app.provider/notes")).unwrap(),
        "vnd.tableroute.dir/notes"
    );
    assert_eq!(
        router
            .content_type(&locator("app.provider/notes/3"))
            .unwrap(),
        "vnd.tableroute.item/notes"
    );
    assert_eq!(
        router.content_type(&locator("app.provider/tags/1")).unwrap(),
        "vnd.tableroute.item/tags"
    );
}

// =========================================================================
// Unmatched locators: reads degrade, writes raise
// =========================================================================

#[test]
fn test_unmatched_locator_query_returns_empty() {
    let (router, _engine, _notifier) = operational_router(&["notes"]);

    let result = router
        .query(&locator("app.provider/unknown"), &[], None, &[], None)
        .unwrap();
    assert!(result.is_empty());
    assert!(result.notification_locator.is_none());
}

#[test]
fn test_unmatched_locator_writes_fail() {
    let (router, _engine, notifier) = operational_router(&["notes"]);
    let unknown = locator("app.provider/unknown");

    assert!(matches!(
        router.insert(&unknown, &Values::new()),
        Err(DispatchError::UnknownLocator(_))
    ));
    assert!(matches!(
        router.delete(&unknown, None, &[]),
        Err(DispatchError::UnknownLocator(_))
    ));
    assert!(matches!(
        router.update(&unknown, &Values::new(), None, &[]),
        Err(DispatchError::UnknownLocator(_))
    ));
    assert!(matches!(
        router.content_type(&unknown),
        Err(DispatchError::UnknownLocator(_))
    ));
    assert!(notifier.is_empty());
}

#[test]
fn test_foreign_authority_never_matches() {
    let (router, _engine, _notifier) = operational_router(&["notes"]);

    let result = router
        .query(&locator("other.provider/notes"), &[], None, &[], None)
        .unwrap();
    assert!(result.is_empty());
}

// =========================================================================
// Single-table router
// =========================================================================

#[test]
fn test_single_table_router_passes_through() {
    let notifier = Arc::new(MemoryNotifier::new());
    let router = TableRouter::new(provider_config(), table_handler("notes"))
        .with_notifier(notifier.clone());
    let engine = Arc::new(MemoryEngine::new());
    router.on_create_storage(engine.as_ref()).unwrap();
    router.attach_storage(engine);

    let inserted = router
        .insert(&locator("app.provider/notes"), &title_values("alpha"))
        .unwrap()
        .unwrap();
    assert_eq!(inserted.to_string(), "app.provider/notes/1");

    let one = router
        .query(&locator("app.provider/notes/1"), &[], None, &[], None)
        .unwrap();
    assert_eq!(one.len(), 1);

    assert_eq!(
        router.content_type(&locator("app.provider/notes")).unwrap(),
        "vnd.tableroute.dir/notes"
    );
    assert_eq!(notifier.notifications(), vec![locator("app.provider/notes/1")]);
}

#[test]
fn test_single_table_router_rejects_unknown_locator_writes() {
    let router = TableRouter::new(provider_config(), table_handler("notes"));

    assert!(matches!(
        router.insert(&locator("app.provider/unknown"), &Values::new()),
        Err(DispatchError::UnknownLocator(_))
    ));
    let result = router
        .query(&locator("app.provider/unknown"), &[], None, &[], None)
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_projection_restricts_and_validates_columns() {
    let (router, _engine, _notifier) = operational_router(&["notes"]);
    router
        .insert(&locator("app.provider/notes"), &title_values("alpha"))
        .unwrap();

    let titles = router
        .query(
            &locator("app.provider/notes"),
            &["title".to_string()],
            None,
            &[],
            None,
        )
        .unwrap();
    assert_eq!(titles.rows[0].len(), 1);
    assert!(titles.rows[0].contains_key("title"));

    assert!(matches!(
        router.query(
            &locator("app.provider/notes"),
            &["secret".to_string()],
            None,
            &[],
            None,
        ),
        Err(DispatchError::UnknownColumn(_))
    ));
}

#[test]
fn test_blank_sort_order_falls_back_to_default() {
    let (router, _engine, _notifier) = operational_router(&["notes"]);

    for title in ["beta", "alpha"] {
        router
            .insert(&locator("app.provider/notes"), &title_values(title))
            .unwrap();
    }

    // Blank sort order uses the configured default (_id ASC).
    let by_default = router
        .query(&locator("app.provider/notes"), &[], None, &[], Some("  "))
        .unwrap();
    assert_eq!(by_default.rows[0].get("title"), Some(&json!("beta")));

    let by_title = router
        .query(
            &locator("app.provider/notes"),
            &[],
            None,
            &[],
            Some("title ASC"),
        )
        .unwrap();
    assert_eq!(by_title.rows[0].get("title"), Some(&json!("alpha")));
}

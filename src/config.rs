//! Table and provider declarations.
//!
//! These types are data: bootstrap code declares them (or deserializes them
//! from configuration) and hands them to handlers and routers, which treat
//! them as immutable after construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::locator::Locator;

/// Declaration of one table served by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name in the storage engine
    pub table_name: String,

    /// Sort order applied when a query supplies none
    pub default_sort_order: String,

    /// Canonical locator of the table's collection, e.g.
    /// `app.provider/notes`
    pub collection_locator: Locator,

    /// Content type returned for a collection result
    pub content_type: String,

    /// Content type returned for a single-item result
    pub content_item_type: String,

    /// Column inserted with a null value when an insert supplies no values
    pub placeholder_column: String,

    /// Full ordered set of valid column names
    pub columns: Vec<String>,

    /// Locator path segment identifying the collection, e.g. `notes`
    pub collection_segment: String,
}

impl TableConfig {
    /// Derives the identity projection map from the column list.
    ///
    /// Blank column names are excluded.
    pub fn projection_map(&self) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .filter(|column| !column.trim().is_empty())
            .map(|column| (column.clone(), column.clone()))
            .collect()
    }
}

/// Declaration of the provider a router serves.
///
/// The database name and version belong to the bootstrap collaborator that
/// opens the storage engine; the router itself only consumes the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authority all of the router's locators are registered under
    pub authority: String,

    /// Database file name, consumed by bootstrap
    pub database_name: String,

    /// Database schema version, positive and increasing per upgrade
    pub database_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_map_excludes_blank_columns() {
        let config = TableConfig {
            table_name: "notes".to_string(),
            default_sort_order: "_id ASC".to_string(),
            collection_locator: Locator::parse("app.provider/notes").unwrap(),
            content_type: "vnd.tableroute.dir/notes".to_string(),
            content_item_type: "vnd.tableroute.item/notes".to_string(),
            placeholder_column: "title".to_string(),
            columns: vec![
                "_id".to_string(),
                "title".to_string(),
                "".to_string(),
                "  ".to_string(),
            ],
            collection_segment: "notes".to_string(),
        };

        let map = config.projection_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("_id").map(String::as_str), Some("_id"));
        assert_eq!(map.get("title").map(String::as_str), Some("title"));
    }
}

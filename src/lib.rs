//! tableroute - routing data-access requests to table handlers over one
//! shared relational storage handle
//!
//! Resource locators resolve to integer match codes; in multi-table mode
//! the high bits select the owning handler and the low bits carry its
//! local route code.

pub mod config;
pub mod errors;
pub mod handler;
pub mod locator;
pub mod matcher;
pub mod notify;
pub mod router;
pub mod storage;

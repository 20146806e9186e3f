//! Resource locators.
//!
//! A locator is a hierarchical address of the form
//! `[scheme://]authority/segment/segment/...` identifying a table's
//! collection or a single item within it. The trailing segment of an item
//! locator is the literal row id.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DispatchError;

/// Parsed resource locator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    scheme: Option<String>,
    authority: String,
    segments: Vec<String>,
}

impl Locator {
    /// Parses a locator string.
    ///
    /// The `scheme://` prefix is optional; an empty authority is rejected
    /// as malformed.
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.to_string()), rest),
            None => (None, raw),
        };
        let mut parts = rest.split('/').map(str::to_string);
        let authority = parts.next().unwrap_or_default();

        if authority.is_empty() {
            return Err(DispatchError::MalformedLocator(raw.to_string()));
        }
        let segments: Vec<String> = parts.filter(|s| !s.is_empty()).collect();

        Ok(Self {
            scheme,
            authority,
            segments,
        })
    }

    /// Returns the authority component.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the path segments below the authority.
    pub fn path_segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the trailing path segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns a child locator with `row_id` appended as a new trailing
    /// segment.
    pub fn with_appended_id(&self, row_id: i64) -> Self {
        let mut child = self.clone();
        child.segments.push(row_id.to_string());
        child
    }

    /// Parses the trailing path segment as a row id.
    ///
    /// A missing or non-numeric trailing segment is a caller contract
    /// violation, never coerced to zero.
    pub fn row_id(&self) -> Result<i64, DispatchError> {
        self.last_segment()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DispatchError::MalformedLocator(self.to_string()))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}://", scheme)?;
        }
        write!(f, "{}", self.authority)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Locator {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

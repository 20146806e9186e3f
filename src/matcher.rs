//! Locator pattern matching.
//!
//! # Responsibilities
//! - Register `(authority, path pattern)` pairs tagged with a match code
//! - Resolve an incoming locator to the code of the first matching pattern
//!
//! # Design Decisions
//! - Patterns compiled at registration, immutable once routing starts
//! - Segment-level matching only: `#` matches one all-digits segment, `*`
//!   matches any one segment, everything else matches literally
//! - First registration wins
//! - Explicit `None` for no-match rather than a sentinel code

use crate::locator::Locator;

/// One pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Literal segment, exact match
    Literal(String),
    /// `#`: one segment of decimal digits
    Number,
    /// `*`: any one segment
    Any,
}

impl Segment {
    fn compile(raw: &str) -> Self {
        match raw {
            "#" => Segment::Number,
            "*" => Segment::Any,
            literal => Segment::Literal(literal.to_string()),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == segment,
            Segment::Number => {
                !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
            }
            Segment::Any => !segment.is_empty(),
        }
    }
}

/// A registered route pattern.
#[derive(Debug, Clone)]
struct Pattern {
    authority: String,
    segments: Vec<Segment>,
    code: u32,
}

/// Maps locator patterns to match codes.
///
/// Built once at router construction, read-only afterwards; routing lookups
/// need no synchronization.
#[derive(Debug, Default)]
pub struct LocatorMatcher {
    patterns: Vec<Pattern>,
}

impl LocatorMatcher {
    /// Creates an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path_pattern` under `authority`, tagged with `code`.
    ///
    /// The pattern is a `/`-separated segment list, e.g. `"notes"` or
    /// `"notes/#"`.
    pub fn register(&mut self, authority: &str, path_pattern: &str, code: u32) {
        let segments = path_pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::compile)
            .collect();

        self.patterns.push(Pattern {
            authority: authority.to_string(),
            segments,
            code,
        });
    }

    /// Resolves a locator to the code of the first matching pattern.
    pub fn resolve(&self, locator: &Locator) -> Option<u32> {
        let path = locator.path_segments();

        self.patterns
            .iter()
            .find(|pattern| {
                pattern.authority == locator.authority()
                    && pattern.segments.len() == path.len()
                    && pattern
                        .segments
                        .iter()
                        .zip(path)
                        .all(|(segment, actual)| segment.matches(actual.as_str()))
            })
            .map(|pattern| pattern.code)
    }
}

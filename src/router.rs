//! First-match-wins path router.
//!
//! The router is a pure function over an immutable [`RuleTable`]: no I/O,
//! no locks, no interior mutability. Clones share the table through an
//! `Arc`, so clone freely and call [`Router::route`] from as many tasks
//! as you like.
//!
//! What happens to a request that matches nothing is not the router's
//! business. It says [`MatchResult::NoMatch`]; the caller decides between
//! a 404 and a pass-through.

use std::sync::Arc;

use crate::error::RequestError;
use crate::pattern::split_segments;
use crate::table::RuleTable;

/// Outcome of routing one request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchResult {
    /// Rule `rule` (zero-based table position) matched; `destination` is its
    /// template with every parameter filled from the path.
    Matched { rule: usize, destination: String },
    /// No rule matched.
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Matched { destination, .. } => Some(destination),
            Self::NoMatch => None,
        }
    }
}

/// The request router. Build it once at startup from a loaded table.
#[derive(Clone, Debug)]
pub struct Router {
    table: Arc<RuleTable>,
}

impl Router {
    pub fn new(table: RuleTable) -> Self {
        Self { table: Arc::new(table) }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Route one request path (no query string).
    ///
    /// Malformed paths are rejected before any rule is tried. Otherwise the
    /// rules are tried in table order and the first whose pattern matches
    /// segment-for-segment wins; a pattern never matches a path with a
    /// different number of segments, even if it is a prefix.
    pub fn route(&self, path: &str) -> Result<MatchResult, RequestError> {
        validate_path(path)?;

        let segments: Vec<&str> = split_segments(&path[1..]).collect();

        for (index, rule) in self.table.rules().iter().enumerate() {
            let Some(bound) = rule.pattern().captures(&segments) else {
                continue;
            };
            let destination = rule.destination().render(|name| {
                bound.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
            });
            return Ok(MatchResult::Matched { rule: index, destination });
        }

        Ok(MatchResult::NoMatch)
    }
}

/// Rejects paths that are empty, relative, or that try to climb out of
/// their prefix with `.` / `..` components, however they are spelled.
pub fn validate_path(path: &str) -> Result<(), RequestError> {
    let invalid = |reason| RequestError::InvalidPath { path: path.to_owned(), reason };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid("path must start with `/`"));
    };
    for segment in rest.split('/') {
        let decoded = urlencoding::decode_binary(segment.as_bytes());
        if decoded.iter().any(|&b| matches!(b, b'/' | b'\\')) {
            return Err(invalid("encoded or backslash separators are not allowed"));
        }
        if matches!(&decoded[..], b"." | b"..") {
            return Err(invalid("dot segments are not allowed"));
        }
    }
    Ok(())
}

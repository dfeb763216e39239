//! Error types.
//!
//! Two families, split by when they happen:
//!
//! - [`ConfigError`]: raised while building the rule table. Fatal: the
//!   process must not serve traffic with a table it could not load.
//! - [`RequestError`]: raised per request, before any rule is tried. The
//!   proxy answers that one request with `400` and carries on.
//!
//! A request that matches no rule is *not* an error; see
//! [`MatchResult::NoMatch`](crate::MatchResult::NoMatch).

use std::path::PathBuf;

/// Top-level error returned by the binary and by [`Server::serve`](crate::Server::serve).
///
/// Upstream failures (502, 504) are expressed as HTTP responses, not as
/// `Error`s. This type surfaces infrastructure failures: loading the
/// configuration, binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// A rule table or configuration file that cannot be loaded.
///
/// `index` fields are zero-based positions in the raw rule list.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rule {index}: destination `{destination}` references `:{name}`, which pattern `{pattern}` does not bind")]
    UnboundParameter {
        index: usize,
        pattern: String,
        destination: String,
        name: String,
    },

    #[error("rule {index}: pattern `{pattern}` duplicates rule {first}; it could never match")]
    DuplicatePattern {
        index: usize,
        first: usize,
        pattern: String,
    },

    #[error("rule {index}: invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: &'static str,
    },

    #[error("invalid destination `{destination}`: {reason}")]
    InvalidDestination {
        destination: String,
        reason: String,
    },

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: &'static str,
    },

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A request path rejected before matching.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

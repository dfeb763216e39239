//! Process configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working proxy with the built-in rule table:
//!
//! ```toml
//! listen = "0.0.0.0:3030"
//! forward_timeout_secs = 30
//! # Unmatched requests go here instead of getting a 404.
//! fallback = "http://ui:3000"
//!
//! [[rules]]
//! pattern = "/api/upload"
//! destination = "http://backend:8080/upload"
//!
//! [[rules]]
//! pattern = "/api/download/:port"
//! destination = "http://backend:8080/download/:port"
//! ```
//!
//! Syntactic problems surface as [`ConfigError::Parse`]; semantic ones
//! (bad patterns, unbound parameters) surface from [`Config::rule_table`].

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::table::{RawRule, RuleTable, check_upstream_url};

/// Root configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the proxy listens on.
    pub listen: SocketAddr,

    /// Upper bound on how long an upstream may take to send response headers.
    pub forward_timeout_secs: u64,

    /// Base URL unmatched requests are passed through to. `None` → 404.
    pub fallback: Option<String>,

    /// Rewrite rules, in match order.
    pub rules: Vec<RawRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3030)),
            forward_timeout_secs: 30,
            fallback: None,
            rules: default_rules(),
        }
    }
}

/// The rewrites the proxy ships with: uploads and per-port downloads on the
/// `backend` host.
pub fn default_rules() -> Vec<RawRule> {
    vec![
        RawRule::new("/api/upload", "http://backend:8080/upload"),
        RawRule::new("/api/download/:port", "http://backend:8080/download/:port"),
    ]
}

impl Config {
    /// Read and parse a TOML file. Does not validate rules.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the validated rule table.
    pub fn rule_table(&self) -> Result<RuleTable, ConfigError> {
        RuleTable::load(self.rules.iter().cloned())
    }

    pub fn forward_timeout(&self) -> Result<Duration, ConfigError> {
        if self.forward_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "forward_timeout_secs",
                reason: "must be greater than zero",
            });
        }
        Ok(Duration::from_secs(self.forward_timeout_secs))
    }

    /// The validated fallback base URL, without a trailing `/`.
    pub fn fallback_url(&self) -> Result<Option<String>, ConfigError> {
        let Some(url) = &self.fallback else {
            return Ok(None);
        };
        let uri = check_upstream_url(url).map_err(|reason| ConfigError::InvalidDestination {
            destination: url.clone(),
            reason: format!("fallback: {reason}"),
        })?;
        if uri.query().is_some() {
            return Err(ConfigError::InvalidSetting {
                field: "fallback",
                reason: "base URL must not carry a query string",
            });
        }
        Ok(Some(url.trim_end_matches('/').to_owned()))
    }
}

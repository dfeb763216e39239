//! The rule table: an ordered, immutable list of rewrite rules.
//!
//! Built once at startup by [`RuleTable::load`]; every check that can be
//! done without a request happens here, so a table that loads is a table
//! that can only produce well-formed destinations.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pattern::{Pattern, Template};

/// A rule as written in configuration, before parsing.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RawRule {
    /// Request-path pattern, e.g. `/api/download/:port`.
    #[serde(alias = "source")]
    pub pattern: String,

    /// Destination URL template, e.g. `http://backend:8080/download/:port`.
    pub destination: String,
}

impl RawRule {
    pub fn new(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), destination: destination.into() }
    }
}

/// A parsed and validated rule.
#[derive(Clone, Debug)]
pub struct Rule {
    pattern: Pattern,
    destination: Template,
}

impl Rule {
    pub fn pattern(&self) -> &Pattern { &self.pattern }
    pub fn destination(&self) -> &Template { &self.destination }
}

/// Ordered rules. First match wins; see [`Router`](crate::Router).
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Parse and validate `raw`, preserving order.
    ///
    /// Fails on the first rule that:
    /// - has a malformed pattern ([`ConfigError::InvalidPattern`]),
    /// - references a parameter its pattern does not bind
    ///   ([`ConfigError::UnboundParameter`]),
    /// - does not render to an absolute `http://` URL
    ///   ([`ConfigError::InvalidDestination`]),
    /// - has the same pattern shape as an earlier rule
    ///   ([`ConfigError::DuplicatePattern`]).
    pub fn load<I>(raw: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = RawRule>,
    {
        let mut rules: Vec<Rule> = Vec::new();

        for (index, raw) in raw.into_iter().enumerate() {
            let pattern = Pattern::parse(&raw.pattern).map_err(|reason| {
                ConfigError::InvalidPattern { index, pattern: raw.pattern.clone(), reason }
            })?;
            let destination = Template::parse(&raw.destination);

            if let Some(name) = destination.params().find(|name| !pattern.binds(name)) {
                return Err(ConfigError::UnboundParameter {
                    index,
                    pattern: raw.pattern,
                    destination: raw.destination,
                    name: name.to_owned(),
                });
            }

            // Every parameter renders as a plausible segment value; the result
            // must already be a URL the forwarder can use.
            let sample = destination.render(|_| Some("x"));
            check_upstream_url(&sample).map_err(|reason| ConfigError::InvalidDestination {
                destination: raw.destination.clone(),
                reason: format!("rule {index}: {reason}"),
            })?;

            if let Some(first) = rules.iter().position(|r| r.pattern.same_shape(&pattern)) {
                return Err(ConfigError::DuplicatePattern { index, first, pattern: raw.pattern });
            }

            rules.push(Rule { pattern, destination });
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Accepts only absolute `http://` URLs with an authority: the forwarder
/// speaks plain HTTP/1.1 to the upstream.
pub(crate) fn check_upstream_url(url: &str) -> Result<http::Uri, String> {
    let uri: http::Uri = url.parse().map_err(|e| format!("not a URI: {e}"))?;
    if uri.scheme_str() != Some("http") {
        return Err("scheme must be `http`".to_owned());
    }
    if uri.authority().is_none() {
        return Err("missing host".to_owned());
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(rules: &[(&str, &str)]) -> Result<RuleTable, ConfigError> {
        RuleTable::load(rules.iter().map(|(p, d)| RawRule::new(*p, *d)))
    }

    #[test]
    fn loads_rules_in_order() {
        let table = load(&[
            ("/api/upload", "http://backend:8080/upload"),
            ("/api/download/:port", "http://backend:8080/download/:port"),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rules()[0].pattern().to_string(), "/api/upload");
        assert_eq!(table.rules()[1].destination().as_str(), "http://backend:8080/download/:port");
    }

    #[test]
    fn empty_table_is_valid() {
        assert!(load(&[]).unwrap().is_empty());
    }

    #[test]
    fn unbound_parameter_is_rejected() {
        let err = load(&[("/x", "http://backend:8080/:zone")]).unwrap_err();
        match err {
            ConfigError::UnboundParameter { index, name, .. } => {
                assert_eq!(index, 0);
                assert_eq!(name, "zone");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_pattern_is_rejected() {
        let err = load(&[
            ("/a", "http://one/"),
            ("/b/:x", "http://two/:x"),
            ("/b/:y", "http://three/:y"),
        ])
        .unwrap_err();
        match err {
            ConfigError::DuplicatePattern { index, first, .. } => {
                assert_eq!((index, first), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn literal_and_param_at_same_position_are_not_duplicates() {
        assert!(load(&[("/b/latest", "http://one/"), ("/b/:v", "http://two/:v")]).is_ok());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = load(&[("api/upload", "http://backend/")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { index: 0, .. }));
    }

    #[test]
    fn destination_must_be_absolute_http() {
        for dest in ["/upload", "https://backend/upload", "backend:8080/upload"] {
            let err = load(&[("/api/upload", dest)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDestination { .. }), "{dest}: {err}");
        }
    }

    #[test]
    fn raw_rule_accepts_source_alias() {
        let raw: RawRule =
            toml::from_str("source = \"/a\"\ndestination = \"http://b/\"").unwrap();
        assert_eq!(raw, RawRule::new("/a", "http://b/"));
    }
}

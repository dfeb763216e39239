//! Path patterns and destination templates.
//!
//! Both are parsed once, at load time, into tagged parts so the hot path
//! never re-scans a string looking for `:name` markers:
//!
//! ```text
//! "/api/download/:port"                 → [Literal("api"), Literal("download"), Param("port")]
//! "http://backend:8080/download/:port"  → [Text("http://backend:8080/download/"), Param("port")]
//! ```
//!
//! A parameter marker is a `:` followed by an identifier
//! (`[A-Za-z_][A-Za-z0-9_]*`). In a template that rule is what keeps
//! `://` and the `:8080` port from being read as parameters.

use std::fmt;

/// Marker that introduces a named parameter.
pub(crate) const SIGIL: char = ':';

// ── Pattern ───────────────────────────────────────────────────────────────────

/// One segment of a [`Pattern`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Matches exactly this text, case-sensitive.
    Literal(String),
    /// Matches any single non-empty segment and binds it under this name.
    Param(String),
}

/// A parsed request-path pattern such as `/api/download/:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, &'static str> {
        let rest = raw.strip_prefix('/').ok_or("must start with `/`")?;

        let mut segments = Vec::new();
        for part in split_segments(rest) {
            if part.is_empty() {
                return Err("empty segment");
            }
            match part.strip_prefix(SIGIL) {
                Some(name) => {
                    if !is_identifier(name) {
                        return Err("parameter name must match [A-Za-z_][A-Za-z0-9_]*");
                    }
                    if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                        return Err("parameter bound twice");
                    }
                    segments.push(Segment::Param(name.to_owned()));
                }
                None => segments.push(Segment::Literal(part.to_owned())),
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether this pattern binds a parameter called `name`.
    pub fn binds(&self, name: &str) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name))
    }

    /// Two patterns have the same shape when they match exactly the same
    /// set of paths: parameter names are ignored.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Param(_), Segment::Param(_)) => true,
                _ => false,
            })
    }

    /// Segment-wise match. Returns the bound `(name, value)` pairs in
    /// pattern order, or `None` if the path does not match.
    pub fn captures<'p>(&'p self, path: &[&'p str]) -> Option<Vec<(&'p str, &'p str)>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut bound = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == value => {}
                Segment::Param(name) if !value.is_empty() => bound.push((name.as_str(), *value)),
                _ => return None,
            }
        }
        Some(bound)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => write!(f, "/{lit}")?,
                Segment::Param(name) => write!(f, "/{SIGIL}{name}")?,
            }
        }
        Ok(())
    }
}

// ── Template ──────────────────────────────────────────────────────────────────

/// One piece of a [`Template`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Param(String),
}

/// A parsed destination template such as `http://backend:8080/download/:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = raw;

        while let Some(at) = rest.find(SIGIL) {
            text.push_str(&rest[..at]);
            let after = &rest[at + SIGIL.len_utf8()..];
            let len = identifier_len(after);
            if len == 0 {
                text.push(SIGIL);
                rest = after;
                continue;
            }
            if !text.is_empty() {
                parts.push(Part::Text(std::mem::take(&mut text)));
            }
            parts.push(Part::Param(after[..len].to_owned()));
            rest = &after[len..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }

        Self { raw: raw.to_owned(), parts }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Names of every parameter the template references, in order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param(name) => Some(name.as_str()),
            Part::Text(_) => None,
        })
    }

    /// Fill every placeholder from `lookup`. A name `lookup` cannot resolve
    /// renders as the empty string; [`RuleTable::load`](crate::RuleTable::load)
    /// rejects templates where that could happen.
    pub fn render<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Param(name) => out.push_str(lookup(name).unwrap_or_default()),
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Splits the part of a path after its leading `/`. One trailing `/` is
/// ignored and the root path yields no segments.
pub(crate) fn split_segments(rest: &str) -> impl Iterator<Item = &str> {
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    rest.split('/').filter(move |_| !rest.is_empty())
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}

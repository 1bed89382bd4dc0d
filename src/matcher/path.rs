//! Path patterns with named segments and greedy wildcards.
//!
//! Syntax:
//! - `:name` matches exactly one segment and captures it under `name`
//! - `*` matches one or more segments and captures them as an ordered
//!   sequence, keyed by the wildcard's zero-based index (`"0"`, `"1"`, ...)
//! - anything else is a literal segment
//!
//! Matching and capture share one algorithm, so re-deriving params for a
//! path that already matched is deterministic and side-effect-free.
//!
//! # Example
//!
//! ```
//! use mockwire::matcher::PathPattern;
//!
//! let pattern = PathPattern::parse("/post/:postId").unwrap();
//! let params = pattern.captures("/post/42").unwrap();
//! assert_eq!(params.param("postId"), Some("42"));
//! ```

use std::collections::HashMap;

use crate::error::{MockwireError, Result};

/// One captured value: a single segment or an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A `:name` capture (or a name that occurred once).
    Single(String),
    /// A wildcard capture, or a `:name` repeated in the pattern.
    List(Vec<String>),
}

/// Captures produced by a successful pattern match, keyed by segment name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: HashMap<String, ParamValue>,
}

impl PathParams {
    /// The raw captured value for `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.inner.get(name)
    }

    /// A single-segment capture. Returns `None` for sequences.
    pub fn param(&self, name: &str) -> Option<&str> {
        match self.inner.get(name) {
            Some(ParamValue::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// An ordered-sequence capture (wildcards, repeated names).
    pub fn param_list(&self, name: &str) -> Option<&[String]> {
        match self.inner.get(name) {
            Some(ParamValue::List(values)) => Some(values),
            _ => None,
        }
    }

    /// Number of distinct capture names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert_single(&mut self, name: &str, value: String) {
        match self.inner.remove(name) {
            // Same name repeated in the pattern collects in order.
            Some(ParamValue::Single(first)) => {
                self.inner
                    .insert(name.to_string(), ParamValue::List(vec![first, value]));
            }
            Some(ParamValue::List(mut values)) => {
                values.push(value);
                self.inner.insert(name.to_string(), ParamValue::List(values));
            }
            None => {
                self.inner.insert(name.to_string(), ParamValue::Single(value));
            }
        }
    }

    fn insert_list(&mut self, name: String, values: Vec<String>) {
        self.inner.insert(name, ParamValue::List(values));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A parsed path pattern.
///
/// Built once at handler registration; immutable afterwards. Trailing and
/// duplicate slashes in both pattern and path are insignificant.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| MockwireError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("parameter names are [A-Za-z0-9_]"));
                }
                segments.push(Segment::Param(name.to_string()));
            } else if part == "*" {
                segments.push(Segment::Wildcard);
            } else if part.contains(':') || part.contains('*') {
                return Err(invalid("':' and '*' must form a whole segment"));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Match `path` and produce captures, or `None` on a non-match.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = Vec::new();
        if !match_from(&self.segments, &parts, 0, &mut captures) {
            return None;
        }

        let mut params = PathParams::default();
        for capture in captures {
            match capture {
                Capture::Named(name, value) => params.insert_single(name, value.to_string()),
                Capture::Wild(index, values) => params.insert_list(
                    index.to_string(),
                    values.iter().map(|s| s.to_string()).collect(),
                ),
            }
        }
        Some(params)
    }
}

enum Capture<'p, 'a> {
    Named(&'p str, &'a str),
    Wild(usize, Vec<&'a str>),
}

/// Backtracking segment matcher. `wildcard_index` numbers the wildcards
/// seen so far, which becomes the capture key.
fn match_from<'p, 'a>(
    segments: &'p [Segment],
    parts: &[&'a str],
    wildcard_index: usize,
    captures: &mut Vec<Capture<'p, 'a>>,
) -> bool {
    let Some(segment) = segments.first() else {
        return parts.is_empty();
    };

    match segment {
        Segment::Literal(literal) => match parts.first() {
            Some(part) if *part == literal.as_str() => {
                match_from(&segments[1..], &parts[1..], wildcard_index, captures)
            }
            _ => false,
        },
        Segment::Param(name) => match parts.first() {
            Some(part) => {
                captures.push(Capture::Named(name, part));
                if match_from(&segments[1..], &parts[1..], wildcard_index, captures) {
                    true
                } else {
                    captures.pop();
                    false
                }
            }
            None => false,
        },
        Segment::Wildcard => {
            // Greedy: longest take first, minimum one segment.
            for take in (1..=parts.len()).rev() {
                captures.push(Capture::Wild(wildcard_index, parts[..take].to_vec()));
                if match_from(&segments[1..], &parts[take..], wildcard_index + 1, captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
    }
}

//! Field paths into a resource
//!
//! Paths address values inside the serialized form of a resource and use the
//! serde field names (`.udpHealthCheck.port`, `.backends[0].group`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathElem {
    /// Struct field
    Field(String),
    /// Array element
    Index(usize),
    /// Map entry
    MapKey(String),
}

/// Path to a value inside a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<PathElem>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        self.with(PathElem::Field(name.into()))
    }

    pub fn index(&self, i: usize) -> Self {
        self.with(PathElem::Index(i))
    }

    pub fn map_key(&self, key: impl Into<String>) -> Self {
        self.with(PathElem::MapKey(key.into()))
    }

    fn with(&self, elem: PathElem) -> Self {
        let mut elems = self.0.clone();
        elems.push(elem);
        Self(elems)
    }

    pub fn elems(&self) -> &[PathElem] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` equals `other` or lies underneath it.
    pub fn has_prefix(&self, other: &Path) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Look up the value at this path.
    pub fn lookup<'a>(&self, mut value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        for elem in &self.0 {
            value = match elem {
                PathElem::Field(name) | PathElem::MapKey(name) => value.get(name.as_str())?,
                PathElem::Index(i) => value.get(*i)?,
            };
        }
        Some(value)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for elem in &self.0 {
            match elem {
                PathElem::Field(name) => write!(f, ".{}", name)?,
                PathElem::Index(i) => write!(f, "[{}]", i)?,
                PathElem::MapKey(key) => write!(f, "[{:?}]", key)?,
            }
        }
        Ok(())
    }
}

/// Pattern matched against concrete paths, used by field traits.
///
/// Syntax is dotted field names where `[]` stands for any array index or map
/// key: `backends[].group`, `labels[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    elems: Vec<PatternElem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternElem {
    Field(String),
    Any,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        let mut elems = Vec::new();
        for segment in raw.trim_start_matches('.').split('.') {
            let mut name = segment;
            let mut any = 0;
            while let Some(stripped) = name.strip_suffix("[]") {
                name = stripped;
                any += 1;
            }
            if !name.is_empty() {
                elems.push(PatternElem::Field(name.to_string()));
            }
            elems.extend(std::iter::repeat_n(PatternElem::Any, any));
        }
        Self {
            raw: raw.to_string(),
            elems,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field names of the pattern with wildcards marked as `None`.
    pub fn segments(&self) -> impl Iterator<Item = Option<&str>> {
        self.elems.iter().map(|e| match e {
            PatternElem::Field(name) => Some(name.as_str()),
            PatternElem::Any => None,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.0.len() == self.elems.len() && self.agrees(path)
    }

    /// Whether `path` and the pattern agree on their common prefix, that
    /// is `path` contains a match, is one, or lies underneath one.
    pub fn overlaps(&self, path: &Path) -> bool {
        self.agrees(path)
    }

    fn agrees(&self, path: &Path) -> bool {
        self.elems
            .iter()
            .zip(&path.0)
            .all(|(pattern, elem)| match (pattern, elem) {
                (PatternElem::Any, PathElem::Index(_) | PathElem::MapKey(_)) => true,
                (PatternElem::Field(want), PathElem::Field(got)) => want == got,
                _ => false,
            })
    }

    /// Whether `path` equals the pattern or lies underneath a match.
    pub fn covers(&self, path: &Path) -> bool {
        path.0.len() >= self.elems.len() && self.matches(&Path(path.0[..self.elems.len()].to_vec()))
    }

    /// Concrete paths in `value` that match this pattern.
    pub fn expand(&self, value: &serde_json::Value) -> Vec<Path> {
        let mut out = Vec::new();
        expand_into(&self.elems, value, Path::root(), &mut out);
        out
    }
}

fn expand_into(
    elems: &[PatternElem],
    value: &serde_json::Value,
    at: Path,
    out: &mut Vec<Path>,
) {
    let Some((first, rest)) = elems.split_first() else {
        out.push(at);
        return;
    };
    match first {
        PatternElem::Field(name) => {
            if let Some(child) = value.get(name.as_str()) {
                expand_into(rest, child, at.field(name.clone()), out);
            }
        }
        PatternElem::Any => match value {
            serde_json::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    expand_into(rest, item, at.index(i), out);
                }
            }
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    expand_into(rest, item, at.map_key(key.clone()), out);
                }
            }
            _ => {}
        },
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

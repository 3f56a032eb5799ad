//! Locating and rewriting references inside document trees.
//!
//! A reference is the string value of a `_ref` key at any depth. Walks are
//! depth-first in field order, so the output is deterministic for a given
//! document.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::types::document::Document;

/// Key that holds a reference target id.
pub const REF_KEY: &str = "_ref";

/// One step into a JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHit {
    /// Path from the document root to the `_ref` key itself
    pub path: Vec<PathSegment>,
    pub target: String,
}

/// Every `(path, referencedId)` pair in the document.
pub fn extract_references(document: &Document) -> Vec<ReferenceHit> {
    let mut hits = Vec::new();
    let mut path = Vec::new();
    for (key, value) in document.fields() {
        walk_entry(key, value, &mut path, &mut hits);
    }
    hits
}

fn walk_entry(key: &str, value: &Value, path: &mut Vec<PathSegment>, hits: &mut Vec<ReferenceHit>) {
    path.push(PathSegment::Key(key.to_string()));
    if key == REF_KEY {
        if let Value::String(target) = value {
            hits.push(ReferenceHit {
                path: path.clone(),
                target: target.clone(),
            });
        }
    } else {
        walk(value, path, hits);
    }
    path.pop();
}

fn walk(value: &Value, path: &mut Vec<PathSegment>, hits: &mut Vec<ReferenceHit>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk_entry(key, child, path, hits);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                walk(child, path, hits);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Distinct referenced ids, in first-seen order.
pub fn extract_reference_ids(document: &Document) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_references(document)
        .into_iter()
        .filter_map(|hit| seen.insert(hit.target.clone()).then_some(hit.target))
        .collect()
}

/// Total number of references across documents, duplicates included.
pub fn reference_count(documents: &[Document]) -> usize {
    documents
        .iter()
        .map(|doc| extract_references(doc).len())
        .sum()
}

/// Overwrite the value at `path`. Returns false (and changes nothing) when
/// the path does not exist.
pub fn set_at_path(document: &mut Document, path: &[PathSegment], value: Value) -> bool {
    let Some((PathSegment::Key(first), rest)) = path.split_first() else {
        return false;
    };
    let Some(mut cursor) = document.fields_mut().get_mut(first) else {
        return false;
    };
    for segment in rest {
        let next = match (segment, cursor) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(child) => cursor = child,
            None => return false,
        }
    }
    *cursor = value;
    true
}

/// Dotted rendering for logs, e.g. `body[2].asset._ref`.
pub fn format_path(path: &[PathSegment]) -> String {
    PathDisplay(path).to_string()
}

struct PathDisplay<'a>(&'a [PathSegment]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

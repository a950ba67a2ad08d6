//! Query descriptors and their local evaluation.
//!
//! A [`QueryDescriptor`] names a collection, a predicate, and a sort spec,
//! which together form the logical identity of a subscription. The
//! predicate and sort
//! are evaluated locally both by the in-memory remote (to decide which
//! subscribers a mutation touches) and by the materializer (to keep view
//! state ordered).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::Document;
use crate::types::CollectionPath;

/// Filter over a collection's documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every document matches.
    All,
    /// Field equals the given value.
    FieldEq(String, Value),
    /// Array field contains the given value.
    ArrayContains(String, Value),
    /// String field starts with the given prefix (typeahead range scan).
    Prefix(String, String),
}

impl Predicate {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::FieldEq(field, expected) => doc.fields.get(field) == Some(expected),
            Self::ArrayContains(field, needle) => doc
                .fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(needle)),
            Self::Prefix(field, prefix) => doc
                .fields
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// The key a subscription sorts on.
#[derive(Debug, Clone, PartialEq)]
pub enum SortField {
    /// The document's server-assigned commit timestamp.
    Timestamp,
    /// A named document field, compared as JSON scalar.
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort specification for a subscription's view state.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: Direction,
}

impl SortSpec {
    pub fn timestamp_desc() -> Self {
        Self {
            field: SortField::Timestamp,
            direction: Direction::Descending,
        }
    }

    pub fn timestamp_asc() -> Self {
        Self {
            field: SortField::Timestamp,
            direction: Direction::Ascending,
        }
    }

    pub fn field_asc(name: impl Into<String>) -> Self {
        Self {
            field: SortField::Field(name.into()),
            direction: Direction::Ascending,
        }
    }

    pub fn field_desc(name: impl Into<String>) -> Self {
        Self {
            field: SortField::Field(name.into()),
            direction: Direction::Descending,
        }
    }

    /// Total order over documents under this spec.
    ///
    /// Pending timestamps compare newest. Identifier is the stable secondary
    /// key, so ordering is deterministic for equal (or both-pending) keys.
    pub fn cmp(&self, a: &Document, b: &Document) -> Ordering {
        let primary = match &self.field {
            SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            SortField::Field(name) => cmp_values(a.fields.get(name), b.fields.get(name)),
        };
        let primary = match self.direction {
            Direction::Ascending => primary,
            Direction::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Compare JSON scalars: numbers numerically, strings lexicographically,
/// anything else (or a missing field) sorts last.
///
/// String pairs that both parse as RFC 3339 instants compare as instants.
/// Serialized timestamps carry variable fractional-second precision, and
/// raw byte order is not chronological across precisions
/// (`"…00.500Z"` > `"…00.500123456Z"`).
fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            Some(Value::Number(_)) | Some(Value::String(_)) | Some(Value::Bool(_)) => 0,
            _ => 1,
        }
    }

    fn as_instant(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (as_instant(x), as_instant(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Logical identity of a subscription: collection, predicate, sort.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub path: CollectionPath,
    pub predicate: Predicate,
    pub sort: SortSpec,
}

impl QueryDescriptor {
    pub fn new(path: CollectionPath, predicate: Predicate, sort: SortSpec) -> Self {
        Self {
            path,
            predicate,
            sort,
        }
    }
}

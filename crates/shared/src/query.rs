//! Filter expressions and sort keys in the REST search convention.
//!
//! A [`Query`] serializes to the operator objects the search endpoints
//! accept: `{"_and": [...]}`, `{"_not": {...}}`, `{"_like": {"title": "x"}}`,
//! `{"_parent": {"_type": "case", "_query": {...}}}` and plain field equality.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Eq { field: String, value: Value },
    Like { field: String, value: String },
    In { field: String, values: Vec<Value> },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Parent { parent_type: String, query: Box<Query> },
}

impl Query {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn like(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Like {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    /// Conjunction that flattens nested `_and` nodes. A single operand is
    /// returned as-is.
    pub fn and(operands: impl IntoIterator<Item = Query>) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Query::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        Query::And(flat)
    }

    pub fn or(operands: impl IntoIterator<Item = Query>) -> Self {
        Query::Or(operands.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(query: Query) -> Self {
        Query::Not(Box::new(query))
    }

    pub fn parent(parent_type: impl Into<String>, query: Query) -> Self {
        Query::Parent {
            parent_type: parent_type.into(),
            query: Box::new(query),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::Eq { field, value } => single_field(field, value.clone()),
            Query::Like { field, value } => {
                json!({ "_like": single_field(field, Value::String(value.clone())) })
            }
            Query::In { field, values } => {
                json!({ "_in": { "_field": field, "_values": values } })
            }
            Query::And(operands) => {
                json!({ "_and": operands.iter().map(Query::to_json).collect::<Vec<_>>() })
            }
            Query::Or(operands) => {
                json!({ "_or": operands.iter().map(Query::to_json).collect::<Vec<_>>() })
            }
            Query::Not(inner) => json!({ "_not": inner.to_json() }),
            Query::Parent { parent_type, query } => json!({
                "_parent": { "_type": parent_type, "_query": query.to_json() }
            }),
        }
    }
}

fn single_field(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Value::Object(map)
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One `+field` / `-field` sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sort key `{0}`")]
pub struct InvalidSortKey(pub String);

impl FromStr for SortKey {
    type Err = InvalidSortKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (direction, field) = if let Some(field) = raw.strip_prefix('-') {
            (SortDirection::Descending, field)
        } else if let Some(field) = raw.strip_prefix('+') {
            (SortDirection::Ascending, field)
        } else {
            (SortDirection::Ascending, raw)
        };
        if field.is_empty() || field.starts_with(['+', '-']) {
            return Err(InvalidSortKey(raw.to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl Serialize for SortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            SortDirection::Ascending => '+',
            SortDirection::Descending => '-',
        };
        write!(f, "{sign}{}", self.field)
    }
}

/// Result window requested from a search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    All,
    Window { start: usize, end: usize },
}

impl Range {
    pub fn first_page(page_size: usize) -> Self {
        Range::Window {
            start: 0,
            end: page_size,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::All => f.write_str("all"),
            Range::Window { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;

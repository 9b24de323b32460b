use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored JSON object.
pub type Document = Value;

/// Top-level field equality, e.g. `{"wallet_address": "..."}`.
pub type Filter = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub descending: bool,
}

impl SortBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }
}

/// Collection-scoped document store used as the scan ledger.
///
/// Upserts on the same `(collection, filter)` are atomic; last write wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Merge `document`'s fields into the document matching `filter`,
    /// creating it (with the filter fields included) when none exists.
    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> Result<(), StoreError>;

    /// Insert a new document and return its id.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<i64>,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> bool {
        true
    }
}

/// Single-field equality filter.
pub fn filter_eq(field: &str, value: impl Into<Value>) -> Filter {
    let mut filter = Map::new();
    filter.insert(field.to_string(), value.into());
    filter
}

pub fn matches(document: &Document, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

pub(crate) fn into_object(document: Document) -> Result<Map<String, Value>, StoreError> {
    match document {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Ordering used by in-process sorting: numbers, then strings, then the rest.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

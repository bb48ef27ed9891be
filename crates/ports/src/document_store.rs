//! Document-store boundary contract.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Queries are
//! limited to equality filters, a single ordering field and a limit, which is
//! all the trainer needs for session history and profile lookups.

use crate::BoxFuture;
use rehearse_shared::{RequestContext, Result};
use serde_json::Value;

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    /// Collection name (`sessions`, `users`, `evaluations`).
    pub collection: Box<str>,
    /// Document id within the collection.
    pub id: Box<str>,
}

impl DocumentKey {
    /// Build a key from string-like parts.
    pub fn new(collection: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        Self {
            collection: collection.as_ref().into(),
            id: id.as_ref().into(),
        }
    }
}

/// How a write combines with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the whole document.
    #[default]
    Replace,
    /// Shallow-merge top-level fields into the existing document.
    Merge,
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field name.
    pub field: Box<str>,
    /// Value the field must equal.
    pub equals: Value,
}

/// Ordering applied to query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field name.
    pub field: Box<str>,
    /// Sort descending when true.
    pub descending: bool,
}

/// Collection query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentQuery {
    /// Collection to scan.
    pub collection: Box<str>,
    /// All filters must match.
    pub filters: Vec<FieldFilter>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Maximum results.
    pub limit: Option<u32>,
}

impl DocumentQuery {
    /// Query every document in `collection`.
    pub fn collection(collection: impl AsRef<str>) -> Self {
        Self {
            collection: collection.as_ref().into(),
            ..Self::default()
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl AsRef<str>, equals: Value) -> Self {
        self.filters.push(FieldFilter {
            field: field.as_ref().into(),
            equals,
        });
        self
    }

    /// Order by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl AsRef<str>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.as_ref().into(),
            descending,
        });
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document id.
    pub id: Box<str>,
    /// Document body.
    pub data: Value,
}

/// Boundary contract for the document database.
pub trait DocumentStorePort: Send + Sync {
    /// Fetch a document, or `None` if it does not exist.
    fn get(&self, ctx: &RequestContext, key: DocumentKey) -> BoxFuture<'_, Result<Option<Value>>>;

    /// Write a document.
    fn set(
        &self,
        ctx: &RequestContext,
        key: DocumentKey,
        data: Value,
        mode: WriteMode,
    ) -> BoxFuture<'_, Result<()>>;

    /// Run a collection query.
    fn query(
        &self,
        ctx: &RequestContext,
        query: DocumentQuery,
    ) -> BoxFuture<'_, Result<Vec<StoredDocument>>>;
}

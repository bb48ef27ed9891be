//! Local key-value storage boundary contract.

use crate::BoxFuture;
use rehearse_shared::{RequestContext, Result};

/// Boundary contract for small persistent string values (drafts, last
/// scenario, preferences).
pub trait KeyValueStorePort: Send + Sync {
    /// Read a value.
    fn get(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<Option<String>>>;

    /// Write a value, replacing any previous one.
    fn set(&self, ctx: &RequestContext, key: Box<str>, value: String) -> BoxFuture<'_, Result<()>>;

    /// Remove a value; returns true if it existed.
    fn remove(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<bool>>;
}

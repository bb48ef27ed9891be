//! In-memory document store.

use rehearse_ports::{
    BoxFuture, DocumentKey, DocumentQuery, DocumentStorePort, StoredDocument, WriteMode,
};
use rehearse_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

type Collection = BTreeMap<Box<str>, Map<String, Value>>;

/// Document store held in process memory. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<BTreeMap<Box<str>, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl DocumentStorePort for InMemoryDocumentStore {
    fn get(&self, ctx: &RequestContext, key: DocumentKey) -> BoxFuture<'_, Result<Option<Value>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("document_store.get")?;
            let collections = self.collections.read().await;
            Ok(collections
                .get(&key.collection)
                .and_then(|collection| collection.get(&key.id))
                .map(|fields| Value::Object(fields.clone())))
        })
    }

    fn set(
        &self,
        ctx: &RequestContext,
        key: DocumentKey,
        data: Value,
        mode: WriteMode,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("document_store.set")?;
            validate_key(&key)?;
            let Value::Object(fields) = data else {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "document data must be a JSON object",
                )
                .with_metadata("collection", key.collection.as_ref())
                .with_metadata("id", key.id.as_ref()));
            };

            let mut collections = self.collections.write().await;
            let collection = collections.entry(key.collection).or_default();
            match collection.entry(key.id) {
                Entry::Occupied(mut entry) if mode == WriteMode::Merge => {
                    entry.get_mut().extend(fields);
                },
                Entry::Occupied(mut entry) => {
                    entry.insert(fields);
                },
                Entry::Vacant(entry) => {
                    entry.insert(fields);
                },
            }
            Ok(())
        })
    }

    fn query(
        &self,
        ctx: &RequestContext,
        query: DocumentQuery,
    ) -> BoxFuture<'_, Result<Vec<StoredDocument>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("document_store.query")?;
            let collections = self.collections.read().await;
            let Some(collection) = collections.get(&query.collection) else {
                return Ok(Vec::new());
            };

            let mut matches: Vec<(&str, &Map<String, Value>)> = collection
                .iter()
                .map(|(id, fields)| (id.as_ref(), fields))
                .filter(|(_, fields)| {
                    query
                        .filters
                        .iter()
                        .all(|filter| fields.get(filter.field.as_ref()) == Some(&filter.equals))
                })
                .collect();

            if let Some(order) = query.order_by.as_ref() {
                matches.sort_by(|(_, left), (_, right)| {
                    let ordering = compare_values(
                        left.get(order.field.as_ref()),
                        right.get(order.field.as_ref()),
                    );
                    if order.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
            }

            let limit = query
                .limit
                .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(matches
                .into_iter()
                .take(limit)
                .map(|(id, fields)| StoredDocument {
                    id: id.into(),
                    data: Value::Object(fields.clone()),
                })
                .collect())
        })
    }
}

fn validate_key(key: &DocumentKey) -> Result<()> {
    if key.collection.trim().is_empty() || key.id.trim().is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "document collection and id must be non-empty",
        ));
    }
    Ok(())
}

/// Missing < null < bool < number < string; arrays and objects sort last.
fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    const fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_) | Value::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (Some(Value::Number(left)), Some(Value::Number(right))) => {
            let left = left.as_f64().unwrap_or_default();
            let right = right.as_f64().unwrap_or_default();
            left.total_cmp(&right)
        },
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        _ => rank(left).cmp(&rank(right)),
    }
}

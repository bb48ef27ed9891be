//! Key-value store adapters (in-memory and JSON file).

use rehearse_ports::{BoxFuture, KeyValueStorePort};
use rehearse_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

type Entries = BTreeMap<Box<str>, String>;

/// Process-local key-value store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<Entries>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorePort for InMemoryKeyValueStore {
    fn get(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<Option<String>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.get")?;
            Ok(self.entries.lock().await.get(&key).cloned())
        })
    }

    fn set(&self, ctx: &RequestContext, key: Box<str>, value: String) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.set")?;
            validate_key(&key)?;
            self.entries.lock().await.insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.remove")?;
            Ok(self.entries.lock().await.remove(&key).is_some())
        })
    }
}

/// Key-value store persisted as a single JSON object on disk.
///
/// Every write rewrites the file through a temporary sibling and a rename,
/// so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileKeyValueStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries> {
        match tokio::fs::read(&self.path).await {
            Ok(payload) if payload.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
            Ok(payload) => serde_json::from_slice(&payload).map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("storage", "kv_parse_failed"),
                    format!("failed to parse key-value file: {error}"),
                    ErrorClass::NonRetriable,
                )
                .with_metadata("path", self.path.to_string_lossy().to_string())
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(error) => Err(ErrorEnvelope::from(error)
                .with_metadata("path", self.path.to_string_lossy().to_string())),
        }
    }

    async fn store(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ErrorEnvelope::from)?;
        }
        let payload = serde_json::to_vec_pretty(entries).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("failed to serialize key-value file: {error}"),
                ErrorClass::NonRetriable,
            )
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, payload)
            .await
            .map_err(ErrorEnvelope::from)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(ErrorEnvelope::from)?;
        Ok(())
    }
}

impl KeyValueStorePort for FileKeyValueStore {
    fn get(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<Option<String>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.get")?;
            let _guard = self.lock.lock().await;
            Ok(self.load().await?.remove(&key))
        })
    }

    fn set(&self, ctx: &RequestContext, key: Box<str>, value: String) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.set")?;
            validate_key(&key)?;
            let _guard = self.lock.lock().await;
            let mut entries = self.load().await?;
            entries.insert(key, value);
            self.store(&entries).await
        })
    }

    fn remove(&self, ctx: &RequestContext, key: Box<str>) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("kv_store.remove")?;
            let _guard = self.lock.lock().await;
            let mut entries = self.load().await?;
            if entries.remove(&key).is_none() {
                return Ok(false);
            }
            self.store(&entries).await?;
            Ok(true)
        })
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "storage key must be non-empty",
        ));
    }
    Ok(())
}

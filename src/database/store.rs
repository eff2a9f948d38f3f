//! Whole-document store interface and the non-SQL backends.
//!
//! A store keeps one JSON object per named collection. `get` returns the
//! whole object (empty when the collection was never written) and `put`
//! replaces it. There is no partial update and no cross-collection
//! transaction; callers serialize read-modify-write cycles themselves
//! (see [`crate::database::Database`]).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Ordered JSON object holding a whole collection.
pub type Document = Map<String, Value>;

/// Keyed collections with read-whole / replace-whole semantics.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads a whole collection; absent collections read as empty.
    async fn get(&self, name: &str) -> Result<Document, StoreError>;

    /// Replaces a whole collection.
    async fn put(&self, name: &str, document: &Document) -> Result<(), StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Process-local store, used for tests and `memory:` URLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Document>>,
}

impl MemoryStore {
    /// Empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, name: &str) -> Result<Document, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, name: &str, document: &Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .insert(name.to_string(), document.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// One `<name>.json` file per collection inside a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Opens (and creates if needed) the collection directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl Store for JsonDirStore {
    async fn get(&self, name: &str) -> Result<Document, StoreError> {
        let path = self.path_for(name);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Document::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(name.to_string())),
        }
    }

    async fn put(&self, name: &str, document: &Document) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(document)?;
        let target = self.path_for(name);
        let temp = self.dir.join(format!(".{name}.json.tmp"));
        tokio::fs::write(&temp, body).await?;
        tokio::fs::rename(&temp, &target).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

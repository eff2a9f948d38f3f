//! Persistence: store backends, typed collection access and models.

pub mod connection;
pub mod locks;
pub mod models;
pub mod store;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::database::connection::DatabaseManager;
use crate::database::locks::{KeyGuard, KeyedLocks};
use crate::database::store::{JsonDirStore, MemoryStore, Store};
use crate::error::{BotError, StoreError};
use crate::utils::logging::{log_store_error, log_store_operation};

/// Logical collection names.
pub mod collections {
    /// player-id → Player
    pub const USERS: &str = "users";
    /// training-id → one-off Training
    pub const ONE_TIME_TRAININGS: &str = "one_time_trainings";
    /// training-id → recurring Training
    pub const CONSTANT_TRAININGS: &str = "constant_trainings";
    /// `{"votes": {fingerprint → ballot}}`
    pub const VOTES: &str = "votes";
    /// debt-key → Debt
    pub const PAYMENTS: &str = "payments";
    /// game-id → Game
    pub const GAMES: &str = "games";
    /// game-id → ballot
    pub const GAME_VOTES: &str = "game_votes";
    /// archive-id → Archive Entry
    pub const TRAINING_VOTES_ARCHIVE: &str = "training_votes_archive";

    /// Every collection the bot persists.
    pub const ALL: [&str; 8] = [
        USERS,
        ONE_TIME_TRAININGS,
        CONSTANT_TRAININGS,
        VOTES,
        PAYMENTS,
        GAMES,
        GAME_VOTES,
        TRAINING_VOTES_ARCHIVE,
    ];
}

/// Opens the store described by a `DATABASE_URL`.
///
/// Supported forms: `sqlite:<path>`, `json:<dir>` and `memory:`.
pub async fn open_store(url: &str) -> anyhow::Result<Arc<dyn Store>> {
    if let Some(dir) = url.strip_prefix("json:") {
        return Ok(Arc::new(JsonDirStore::open(dir).await?));
    }
    if url.starts_with("memory:") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if url.starts_with("sqlite:") {
        let manager = DatabaseManager::new(url).await?;
        manager.run_migrations().await?;
        return Ok(Arc::new(manager));
    }
    Err(anyhow::anyhow!("Unsupported DATABASE_URL scheme: {url}"))
}

/// Typed access to the store with per-collection and per-fingerprint
/// critical sections.
pub struct Database {
    store: Arc<dyn Store>,
    collection_locks: KeyedLocks,
    fingerprint_locks: KeyedLocks,
}

impl Database {
    /// Typed access over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            collection_locks: KeyedLocks::new(),
            fingerprint_locks: KeyedLocks::new(),
        }
    }

    /// Name of the underlying backend.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Reads a whole collection as `T`.
    pub async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T, BotError> {
        log_store_operation("read", name, None);
        let document = self.store.get(name).await.map_err(|e| {
            log_store_error("read", name, &e.to_string(), None);
            BotError::from(e)
        })?;
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            log_store_error("decode", name, &e.to_string(), None);
            BotError::from(StoreError::from(e))
        })
    }

    /// Read-modify-write of one collection.
    ///
    /// The collection stays locked for the whole cycle. The new document is
    /// written only when `apply` returns `Ok`.
    pub async fn update<T, R, F>(&self, name: &str, apply: F) -> Result<R, BotError>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T) -> Result<R, BotError>,
    {
        let _guard = self.collection_locks.lock(name).await;
        let mut value: T = self.read(name).await?;
        let result = apply(&mut value)?;

        let document = match serde_json::to_value(&value).map_err(StoreError::from)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotAnObject(name.to_string()).into()),
        };
        log_store_operation("write", name, Some(&format!("{} keys", document.len())));
        self.store.put(name, &document).await.map_err(|e| {
            log_store_error("write", name, &e.to_string(), None);
            BotError::from(e)
        })?;
        Ok(result)
    }

    /// Critical section serializing ballot, charge and archive work on one
    /// training fingerprint. Take it before any collection update.
    pub async fn lock_fingerprint(&self, fingerprint: &str) -> KeyGuard {
        self.fingerprint_locks.lock(fingerprint).await
    }

    /// Fingerprints currently locked or waited for.
    pub fn locked_fingerprints(&self) -> usize {
        self.fingerprint_locks.len()
    }

    /// Cheap round trip used by the health endpoint.
    pub async fn ping(&self) -> Result<(), BotError> {
        self.store.get(collections::USERS).await?;
        Ok(())
    }
}

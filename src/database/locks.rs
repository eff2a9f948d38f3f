use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// A family of async critical sections addressed by string key.
///
/// Entries live only while someone holds or waits for the key, so keys
/// taken from chat input do not accumulate. Guards are not reentrant: code
/// holding the guard for a key must not try to take it again.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: LockMap,
}

/// Exclusive access to one key of a [`KeyedLocks`]; released on drop.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    locks: LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    /// Creates an empty lock family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };
        KeyGuard {
            key: key.to_string(),
            locks: self.locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of keys currently held or waited for.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no key is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Waiters clone the entry under this map lock, so a count of one
        // means nobody else can reach it.
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}

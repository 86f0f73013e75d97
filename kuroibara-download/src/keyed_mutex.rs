//! A lock per key, created on first use: a per-job serialization
//! primitive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one [`tokio::sync::Mutex`] per key, so unrelated keys never
/// contend with each other while a given key only ever has one holder.
pub struct KeyedMutex {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    /// An empty registry of per-key locks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, creating it if this is the first
    /// request for that key.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

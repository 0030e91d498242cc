use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Per-key async mutexes
///
/// Holders of the guard for a key run serialized with respect to each other;
/// different keys never contend. Idle entries are pruned once the map grows
/// past `PRUNE_THRESHOLD`.
pub struct KeyedLocks<K> {
    locks: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

const PRUNE_THRESHOLD: usize = 1024;

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Wait for and take the lock for `key`
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.locks.read().await;
            locks.get(key).cloned()
        };
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                if locks.len() >= PRUNE_THRESHOLD {
                    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                }
                locks.entry(key.clone()).or_default().clone()
            }
        };
        lock.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

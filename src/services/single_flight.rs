use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Async mutual exclusion per string key.
///
/// Callers that share a key queue behind one another; unrelated keys do not
/// contend. Entries are dropped again once the last holder releases, so the
/// map only grows with concurrently active keys.
#[derive(Default)]
pub struct KeyedLock {
    locks: LockMap,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let entry = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = Arc::clone(&entry).lock_owned().await;
        KeyedGuard {
            locks: Arc::clone(&self.locks),
            key: key.to_string(),
            entry,
            _guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn active_keys(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// Holds the per-key lock until dropped.
pub struct KeyedGuard {
    locks: LockMap,
    key: String,
    entry: Arc<AsyncMutex<()>>,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self._guard.take();
        let mut locks = self.locks.lock().unwrap();
        if let Some(existing) = locks.get(&self.key) {
            // Two references mean map + this guard: nobody else is waiting.
            if Arc::ptr_eq(existing, &self.entry) && Arc::strong_count(&self.entry) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

//! In-process cache backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::storage::CacheBackend;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Map-backed cache local to one process.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries()?;
        let live = match entries.get(key) {
            None => return Ok(None),
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => None,
        };
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    /// Store `value` and drop every entry that has already expired.
    fn set(&self, key: &str, value: &[u8], timeout: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now.checked_add(timeout).ok_or_else(|| {
            CacheError::Unavailable(format!("timeout of {}s out of range", timeout.as_secs()))
        })?;

        let mut entries = self.entries()?;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

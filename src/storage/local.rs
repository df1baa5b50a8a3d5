//! Local filesystem cache backend.
//!
//! Lets separate CLI invocations share memoized fetches.
//!
//! ## Layout
//!
//! ```text
//! {root}/
//! ├── fetch_tweets_<sha256>.json
//! └── ...
//! ```
//!
//! Each file holds the expiry and the base64-encoded value. Writes go to a
//! temp file first and are renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::storage::CacheBackend;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    expires_at: DateTime<Utc>,
    data: String,
}

/// Directory-backed cache.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root_dir: PathBuf,
}

impl LocalCache {
    /// Create a LocalCache rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// File path for a key. Separators are replaced so keys stay flat.
    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root_dir.join(format!("{name}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.root_dir)?;

        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, path)
    }

    /// Read bytes, returning None if the file doesn't exist.
    fn read_bytes(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl CacheBackend for LocalCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path(key);
        let Some(bytes) = self.read_bytes(&path)? else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        if entry.expires_at <= Utc::now() {
            self.remove(&path)?;
            return Ok(None);
        }

        match STANDARD.decode(entry.data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.remove(&path)?;
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &[u8], timeout: Duration) -> Result<(), CacheError> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| CacheError::Unavailable(format!("timeout out of range: {e}")))?;
        let expires_at = Utc::now()
            .checked_add_signed(timeout)
            .ok_or_else(|| CacheError::Unavailable(format!("timeout of {timeout} out of range")))?;
        let entry = CacheEntry {
            expires_at,
            data: STANDARD.encode(value),
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.write_bytes(&self.path(key), &bytes)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.remove(&self.path(key))?;
        Ok(())
    }
}

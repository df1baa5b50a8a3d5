//! Storage abstractions.
//!
//! Two independent concerns live here:
//!
//! - [`TweetStore`]: durable tweets, accounts and hashtags (SQLite)
//! - [`CacheBackend`]: short-lived byte entries behind the fetch memoizer
//!
//! ```text
//! storage/
//! ├── config.toml     # Scraper configuration
//! ├── tweets.db       # SqliteStore
//! └── cache/          # LocalCache, one JSON file per key
//! ```

pub mod local;
pub mod memory;
pub mod sqlite;

use std::time::Duration;

use crate::error::{CacheError, StoreError};
use crate::models::{Tweet, TweetData};

pub use local::LocalCache;
pub use memory::MemoryCache;
pub use sqlite::SqliteStore;

/// Byte-oriented cache with per-entry expiry.
pub trait CacheBackend: Send + Sync {
    /// Read a live entry. Expired entries read as `None`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key` for `timeout`.
    fn set(&self, key: &str, value: &[u8], timeout: Duration) -> Result<(), CacheError>;

    /// Remove an entry. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Which persisted tweets a query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetFilter {
    /// Tweets tagged with this hashtag, compared case-insensitively
    Hashtag(String),
    /// Tweets posted by this username, compared exactly
    Username(String),
}

/// Trait for tweet persistence backends.
pub trait TweetStore: Send + Sync {
    /// Persist one validated tweet with its account and hashtags.
    ///
    /// Runs in a single transaction: on any error nothing is written.
    fn save_tweet(&self, tweet: &TweetData) -> Result<Tweet, StoreError>;

    /// Number of tweets matching `filter`.
    fn count(&self, filter: &TweetFilter) -> Result<usize, StoreError>;

    /// Matching tweets, newest `tweet_id` first.
    fn fetch(
        &self,
        filter: &TweetFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Tweet>, StoreError>;
}

/// A lazy result set: nothing is read until a method asks for rows.
#[derive(Clone)]
pub struct TweetQuery<'a> {
    store: &'a dyn TweetStore,
    filter: TweetFilter,
}

impl<'a> TweetQuery<'a> {
    pub fn new(store: &'a dyn TweetStore, filter: TweetFilter) -> Self {
        Self { store, filter }
    }

    pub fn filter(&self) -> &TweetFilter {
        &self.filter
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.store.count(&self.filter)
    }

    pub fn page(&self, limit: usize, offset: usize) -> Result<Vec<Tweet>, StoreError> {
        self.store.fetch(&self.filter, Some(limit), offset)
    }

    pub fn all(&self) -> Result<Vec<Tweet>, StoreError> {
        self.store.fetch(&self.filter, None, 0)
    }
}

impl std::fmt::Debug for TweetQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweetQuery")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

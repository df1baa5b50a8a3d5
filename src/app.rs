// src/app.rs

//! Composition root.
//!
//! ```text
//! Transport → SearchTweetsResource (+ RateLimiter)
//!           → TweetFetcher → Memoize (cache backend)
//!           → ListTweets (+ SqliteStore) → Page<TweetView>
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{CacheBackendKind, ClientKind, Config, Page, TweetView};
use crate::pipeline::cache::Memoize;
use crate::pipeline::health::{ApiStatus, check_api_status};
use crate::pipeline::listing::{ListTweets, TweetFetcher};
use crate::pipeline::rate_limit::{MonotonicClock, RateLimiter, RateLimiterConfig, SharedClock};
use crate::services::{FixtureTransport, HttpTransport, SearchTweetsResource, Transport};
use crate::storage::{CacheBackend, LocalCache, MemoryCache, SqliteStore, TweetQuery, TweetStore};

/// A fully wired scraper.
pub struct Scraper {
    listing: ListTweets<Memoize<TweetFetcher>>,
}

impl Scraper {
    /// Validate `config` and build every component from it.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn TweetStore> = Arc::new(SqliteStore::open(&config.storage.database_path)?);
        Self::with_store(config, store)
    }

    /// Build with an already opened tweet store.
    pub fn with_store(config: &Config, store: Arc<dyn TweetStore>) -> Result<Self> {
        let scraper = &config.scraper;

        let transport: Arc<dyn Transport> = match scraper.client {
            ClientKind::V1_1 => Arc::new(HttpTransport::new(&config.api)?),
            ClientKind::Fixture => {
                if !scraper.fixture_path.exists() {
                    return Err(AppError::config(format!(
                        "fixture file not found: {}",
                        scraper.fixture_path.display()
                    )));
                }
                Arc::new(FixtureTransport::load(&scraper.fixture_path)?)
            }
        };

        let clock: SharedClock = Arc::new(MonotonicClock::new());
        let limiter = RateLimiter::with_clock(
            RateLimiterConfig {
                wait_period: Duration::from_secs(scraper.rate_limit_wait_secs),
            },
            clock,
        );
        let resource = SearchTweetsResource::new(&config.api, transport)
            .map_err(|e| AppError::config(e.to_string()))?
            .with_rate_limiter(limiter);

        let backend: Arc<dyn CacheBackend> = match scraper.cache_backend {
            CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
            CacheBackendKind::Local => Arc::new(LocalCache::new(&scraper.cache_dir)),
        };
        let live = scraper.live;
        let fetcher = Memoize::new(
            TweetFetcher::new(Arc::new(resource)),
            backend,
            Duration::from_secs(scraper.cache_timeout_secs),
        )
        .max_items(scraper.max_cached_items)
        .unless(move || live);

        log::info!(
            "Scraper ready (client: {:?}, cache: {:?}, live: {})",
            scraper.client,
            scraper.cache_backend,
            live
        );

        Ok(Self {
            listing: ListTweets::new(fetcher, store, config.listing.default_limit),
        })
    }

    /// Refresh and list tweets tagged with `hashtag`.
    pub fn list_by_hashtag(
        &self,
        hashtag: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Page<TweetView>> {
        let limit = limit.unwrap_or(self.listing.default_limit());
        let query = self.listing.by_hashtag(hashtag, Some(limit))?;
        render(&query, &format!("/hashtags/{hashtag}/"), limit, offset)
    }

    /// Refresh and list tweets posted by `username`.
    pub fn list_by_username(
        &self,
        username: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Page<TweetView>> {
        let limit = limit.unwrap_or(self.listing.default_limit());
        let query = self.listing.by_username(username, Some(limit))?;
        render(&query, &format!("/users/{username}/"), limit, offset)
    }

    /// Check that the upstream API answers.
    pub fn health(&self) -> ApiStatus {
        check_api_status(self.listing.fetcher().inner().resource())
    }
}

fn render(query: &TweetQuery<'_>, path: &str, limit: usize, offset: usize) -> Result<Page<TweetView>> {
    Ok(Page::from_query(query, path, limit, offset)?)
}

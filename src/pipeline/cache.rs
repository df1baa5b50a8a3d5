// src/pipeline/cache.rs

//! Memoization of lazy fetches.
//!
//! [`Memoize`] wraps any [`Fetch`] and caches the *sequence* it yields:
//!
//! - hit: replay the cached items, the wrapped fetch is not called
//! - miss: yield items as they arrive while teeing them into a side buffer;
//!   once the sequence is exhausted the buffer is stored, unless more than
//!   `max_items` were produced
//! - bypass predicate true, or a single-value fetch: run uncached
//!
//! Cache backend failures are logged and treated as a miss (read) or a
//! skipped store (write). They never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;
use crate::storage::CacheBackend;
use crate::utils::cache_key;

/// Whether a fetch yields a lazy sequence or a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Produces {
    #[default]
    Lazy,
    Single,
}

/// An operation producing a sequence of items from serializable arguments.
pub trait Fetch {
    type Args: Serialize;
    type Item: Serialize + DeserializeOwned + Clone + 'static;
    type Error;

    /// Stable identity used in cache keys.
    fn name(&self) -> &str;

    fn produces(&self) -> Produces {
        Produces::Lazy
    }

    fn fetch<'a>(
        &'a self,
        args: &Self::Args,
    ) -> Result<Box<dyn Iterator<Item = Self::Item> + 'a>, Self::Error>;
}

type Predicate = Box<dyn Fn() -> bool + Send + Sync>;

/// Caching wrapper around a [`Fetch`].
pub struct Memoize<F> {
    inner: F,
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
    max_items: usize,
    unless: Option<Predicate>,
}

impl<F: Fetch> Memoize<F> {
    /// Default cap on cached sequence length.
    pub const DEFAULT_MAX_ITEMS: usize = 10_000;

    pub fn new(inner: F, backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self {
            inner,
            backend,
            timeout,
            max_items: Self::DEFAULT_MAX_ITEMS,
            unless: None,
        }
    }

    /// Sequences longer than `max_items` are yielded but not stored.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Skip the cache whenever `predicate` returns true.
    pub fn unless(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.unless = Some(Box::new(predicate));
        self
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Drop the memoized entry for `args`.
    pub fn forget(&self, args: &F::Args) -> Result<(), CacheError> {
        let key = cache_key(self.inner.name(), args)?;
        self.backend.delete(&key)
    }

    fn bypassed(&self) -> bool {
        self.inner.produces() == Produces::Single || self.unless.as_ref().is_some_and(|p| p())
    }

    fn lookup(&self, key: &str) -> Result<Option<Vec<F::Item>>, CacheError> {
        match self.backend.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<F: Fetch> Fetch for Memoize<F> {
    type Args = F::Args;
    type Item = F::Item;
    type Error = F::Error;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn produces(&self) -> Produces {
        self.inner.produces()
    }

    fn fetch<'a>(
        &'a self,
        args: &Self::Args,
    ) -> Result<Box<dyn Iterator<Item = Self::Item> + 'a>, Self::Error> {
        if self.bypassed() {
            return self.inner.fetch(args);
        }

        let key = match cache_key(self.inner.name(), args) {
            Ok(key) => key,
            Err(e) => {
                log::error!("Cannot build cache key for {}: {}", self.inner.name(), e);
                return self.inner.fetch(args);
            }
        };

        match self.lookup(&key) {
            Ok(Some(items)) => {
                log::debug!("Cache hit for {} ({} items)", key, items.len());
                return Ok(Box::new(items.into_iter()));
            }
            Ok(None) => log::debug!("Cache miss for {}", key),
            Err(CacheError::Corrupt(e)) => {
                log::error!("Discarding corrupt cache entry {}: {}", key, e);
            }
            Err(e) => {
                log::error!("Cache backend read failed, running uncached: {}", e);
                return self.inner.fetch(args);
            }
        }

        let source = self.inner.fetch(args)?;
        Ok(Box::new(Tee {
            source,
            buffer: Vec::new(),
            count: 0,
            max_items: self.max_items,
            key,
            backend: self.backend.as_ref(),
            timeout: self.timeout,
            finished: false,
        }))
    }
}

/// Forwards items while buffering them for the cache.
struct Tee<'a, T> {
    source: Box<dyn Iterator<Item = T> + 'a>,
    buffer: Vec<T>,
    count: usize,
    max_items: usize,
    key: String,
    backend: &'a dyn CacheBackend,
    timeout: Duration,
    finished: bool,
}

impl<T: Serialize> Tee<'_, T> {
    fn commit(&mut self) {
        if self.count > self.max_items {
            log::debug!(
                "Not caching {}: {} items exceed cap of {}",
                self.key,
                self.count,
                self.max_items
            );
            return;
        }

        let stored = serde_json::to_vec(&self.buffer)
            .map_err(CacheError::from)
            .and_then(|bytes| self.backend.set(&self.key, &bytes, self.timeout));
        match stored {
            Ok(()) => log::debug!("Cached {} items under {}", self.count, self.key),
            Err(e) => log::error!("Cache backend write failed for {}: {}", self.key, e),
        }
    }
}

impl<T: Serialize + Clone> Iterator for Tee<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        match self.source.next() {
            Some(item) => {
                self.count += 1;
                if self.count <= self.max_items {
                    self.buffer.push(item.clone());
                } else if !self.buffer.is_empty() {
                    self.buffer = Vec::new();
                }
                Some(item)
            }
            None => {
                self.finished = true;
                self.commit();
                None
            }
        }
    }
}

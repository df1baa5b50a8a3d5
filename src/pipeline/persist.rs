// src/pipeline/persist.rs

//! Persistence stage.
//!
//! Each tweet is saved in its own transaction. A failed save is logged and
//! skipped, so one bad record never rolls back or stops its siblings:
//!
//! - duplicate or conflicting record: debug (expected on re-scrapes)
//! - field constraint violation: debug
//! - any other storage failure: error

use crate::error::StoreError;
use crate::models::{RawRecord, Tweet, TweetData};
use crate::pipeline::validate::validate;
use crate::storage::TweetStore;

/// Lazily persist validated tweets, yielding the stored rows.
pub fn persist<'s, I>(store: &'s dyn TweetStore, tweets: I) -> impl Iterator<Item = Tweet> + 's
where
    I: IntoIterator<Item = TweetData>,
    I::IntoIter: 's,
{
    tweets
        .into_iter()
        .filter_map(move |tweet| match store.save_tweet(&tweet) {
            Ok(saved) => Some(saved),
            Err(e @ (StoreError::Integrity(_) | StoreError::Invalid(_))) => {
                log::debug!("Skipping tweet {}: {}", tweet.tweet_id, e);
                None
            }
            Err(e) => {
                log::error!("Failed to store tweet {}: {}", tweet.tweet_id, e);
                None
            }
        })
}

/// Validate and persist raw records, draining the whole pipeline.
pub fn populate<I>(store: &dyn TweetStore, records: I)
where
    I: IntoIterator<Item = RawRecord>,
{
    let stored = persist(store, validate(records)).count();
    log::info!("Stored {} new tweets", stored);
}

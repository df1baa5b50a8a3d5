//! Tweet data structures.
//!
//! Three shapes move through the pipeline:
//! - [`RawRecord`]: untrusted JSON as normalized by the search gateway
//! - [`TweetData`]: a record that passed schema validation
//! - [`Tweet`] / [`Account`] / [`Hashtag`]: rows read back from the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untyped record straight from the search gateway.
pub type RawRecord = serde_json::Value;

/// Maximum tweet text length in characters.
pub const MAX_TEXT_CHARS: usize = 280;

/// Validated account sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountData {
    pub fullname: String,
    pub username: String,
    pub twitter_id: u64,
}

/// Validated hashtag sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashtagData {
    pub name: String,
}

/// A schema-conformant tweet, ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetData {
    pub tweet_id: u64,
    pub account: AccountData,
    pub created_at: DateTime<Utc>,
    pub hashtags: Vec<HashtagData>,
    pub like_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub text: String,
}

impl TweetData {
    /// Validate a raw record against the tweet schema.
    pub fn from_raw(raw: RawRecord) -> serde_json::Result<Self> {
        serde_json::from_value(raw)
    }

    /// Hashtag names in tweet order.
    pub fn hashtag_names(&self) -> impl Iterator<Item = &str> {
        self.hashtags.iter().map(|h| h.name.as_str())
    }
}

/// Persisted account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub fullname: String,
    pub username: String,
    pub twitter_id: u64,
}

/// Persisted hashtag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashtag {
    pub id: i64,
    pub name: String,
}

/// Persisted tweet row with its related entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    pub tweet_id: u64,
    pub account: Account,
    pub created_at: DateTime<Utc>,
    pub hashtags: Vec<Hashtag>,
    pub like_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub text: String,
}

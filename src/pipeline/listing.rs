// src/pipeline/listing.rs

//! Listing use case: fetch → validate → persist → query.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::RawRecord;
use crate::pipeline::cache::Fetch;
use crate::pipeline::persist::populate;
use crate::services::{SearchFilters, SearchTweetsResource};
use crate::storage::{TweetQuery, TweetStore};

/// Arguments of one upstream fetch; also the cache key input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    #[serde(flatten)]
    pub filters: SearchFilters,
    pub limit: Option<usize>,
}

impl FetchParams {
    pub fn new(filters: SearchFilters, limit: Option<usize>) -> Self {
        Self { filters, limit }
    }
}

/// Fetches raw tweet records through the search gateway.
#[derive(Clone)]
pub struct TweetFetcher {
    resource: Arc<SearchTweetsResource>,
}

impl TweetFetcher {
    pub fn new(resource: Arc<SearchTweetsResource>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &SearchTweetsResource {
        &self.resource
    }
}

impl Fetch for TweetFetcher {
    type Args = FetchParams;
    type Item = RawRecord;
    type Error = GatewayError;

    fn name(&self) -> &str {
        "fetch_tweets"
    }

    fn fetch<'a>(
        &'a self,
        args: &FetchParams,
    ) -> Result<Box<dyn Iterator<Item = RawRecord> + 'a>, GatewayError> {
        self.resource.get(&args.filters, args.limit)
    }
}

/// Lists persisted tweets after refreshing them from upstream.
pub struct ListTweets<F> {
    fetcher: F,
    store: Arc<dyn TweetStore>,
    default_limit: usize,
}

impl<F> ListTweets<F>
where
    F: Fetch<Args = FetchParams, Item = RawRecord, Error = GatewayError>,
{
    pub fn new(fetcher: F, store: Arc<dyn TweetStore>, default_limit: usize) -> Self {
        Self {
            fetcher,
            store,
            default_limit,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Refresh the store for `filters`, then return the matching rows.
    ///
    /// `limit` defaults to the configured listing limit. Only invalid
    /// filters fail; upstream trouble yields whatever is already stored.
    pub fn list_by(
        &self,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<TweetQuery<'_>, GatewayError> {
        let filter = filters.validate()?;
        let params = FetchParams::new(filters.clone(), Some(limit.unwrap_or(self.default_limit)));

        let records = self.fetcher.fetch(&params)?;
        populate(self.store.as_ref(), records);

        Ok(TweetQuery::new(self.store.as_ref(), filter))
    }

    pub fn by_hashtag(&self, hashtag: &str, limit: Option<usize>) -> Result<TweetQuery<'_>, GatewayError> {
        self.list_by(&SearchFilters::hashtag(hashtag), limit)
    }

    pub fn by_username(&self, username: &str, limit: Option<usize>) -> Result<TweetQuery<'_>, GatewayError> {
        self.list_by(&SearchFilters::username(username), limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiConfig;
    use crate::services::FixtureTransport;
    use crate::storage::{SqliteStore, TweetFilter};
    use serde_json::{Value, json};

    fn status(id: u64, screen_name: &str, tag: &str) -> Value {
        json!({
            "id": id,
            "created_at": "Thu Jun 10 23:25:09 +0000 2021",
            "text": format!("tweet {id} #{tag}"),
            "favorite_count": 2,
            "retweet_count": 1,
            "entities": {"hashtags": [{"text": tag}]},
            "user": {"id": 99, "name": "Dummy", "screen_name": screen_name}
        })
    }

    fn listing(bodies: Vec<Value>) -> (Arc<FixtureTransport>, ListTweets<TweetFetcher>) {
        let transport = Arc::new(FixtureTransport::from_bodies(bodies));
        let resource = SearchTweetsResource::new(&ApiConfig::default(), transport.clone()).unwrap();
        let store: Arc<dyn TweetStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let listing = ListTweets::new(TweetFetcher::new(Arc::new(resource)), store, 30);
        (transport, listing)
    }

    #[test]
    fn test_fetch_params_serialize_only_active_filter() {
        let params = FetchParams::new(SearchFilters::hashtag("rust"), Some(5));
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"hashtag": "rust", "limit": 5})
        );
    }

    #[test]
    fn test_list_by_hashtag_refreshes_and_queries() {
        let body = json!({"statuses": [status(2, "dummy", "Rust"), status(1, "dummy", "rust")]});
        let (transport, listing) = listing(vec![body]);

        let query = listing.by_hashtag("rust", None).unwrap();
        assert_eq!(query.filter(), &TweetFilter::Hashtag("rust".into()));
        assert_eq!(query.count().unwrap(), 2);
        assert_eq!(
            query.all().unwrap().iter().map(|t| t.tweet_id).collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert_eq!(transport.requests()[0].param("count"), Some("30"));
    }

    #[test]
    fn test_list_by_username_uses_limit() {
        let body = json!({"statuses": [status(3, "dummy", "a"), status(2, "dummy", "b"), status(1, "dummy", "c")]});
        let (transport, listing) = listing(vec![body]);

        let query = listing.by_username("dummy", Some(2)).unwrap();
        assert_eq!(query.count().unwrap(), 2);
        assert_eq!(transport.requests()[0].param("q"), Some("from:dummy"));
        assert_eq!(transport.requests()[0].param("count"), Some("2"));
    }

    #[test]
    fn test_list_by_rejects_bad_filters() {
        let (transport, listing) = listing(Vec::new());

        let err = listing.list_by(&SearchFilters::default(), None).unwrap_err();
        assert!(err.is_configuration());
        assert!(transport.requests().is_empty());
    }
}

//! End-to-end listing flow over recorded responses and an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tweet_scraper::models::{ApiConfig, Page};
use tweet_scraper::pipeline::{ListTweets, Memoize, RateLimitState, TweetFetcher};
use tweet_scraper::services::{FixtureTransport, HttpReply, SearchTweetsResource};
use tweet_scraper::storage::{MemoryCache, SqliteStore, TweetStore};

/// Even ids up to 28 carry a negative retweet count and fail validation.
fn status(id: u64) -> Value {
    let retweets: i64 = if id % 2 == 0 && id <= 28 { -1 } else { 2 };
    json!({
        "id": id,
        "created_at": "Thu Jun 10 23:25:09 +0000 2021",
        "text": format!("Tweet number {id} #python"),
        "favorite_count": 10,
        "retweet_count": retweets,
        "entities": {"hashtags": [{"text": "python", "indices": [16, 23]}]},
        "user": {"id": 15804774, "name": "Guido van Rossum", "screen_name": "gvanrossum"}
    })
}

/// 30 statuses over two pages of 15.
fn bodies() -> Vec<Value> {
    vec![
        json!({
            "statuses": (1..=15).map(status).collect::<Vec<_>>(),
            "search_metadata": {
                "next_results": "?max_id=15&q=%23python&count=15&include_entities=1&result_type=recent"
            }
        }),
        json!({
            "statuses": (16..=30).map(status).collect::<Vec<_>>(),
            "search_metadata": {}
        }),
    ]
}

struct Harness {
    transport: Arc<FixtureTransport>,
    resource: Arc<SearchTweetsResource>,
    listing: ListTweets<Memoize<TweetFetcher>>,
}

fn harness(transport: FixtureTransport, live: bool) -> Harness {
    let transport = Arc::new(transport);
    let resource = Arc::new(SearchTweetsResource::new(&ApiConfig::default(), transport.clone()).unwrap());
    let fetcher = Memoize::new(
        TweetFetcher::new(Arc::clone(&resource)),
        Arc::new(MemoryCache::new()),
        Duration::from_secs(10),
    )
    .unless(move || live);
    let store: Arc<dyn TweetStore> = Arc::new(SqliteStore::open_in_memory().unwrap());

    Harness {
        transport,
        resource,
        listing: ListTweets::new(fetcher, store, 30),
    }
}

#[test]
fn test_default_limit_stores_every_valid_tweet() {
    let h = harness(FixtureTransport::from_bodies(bodies()), true);

    let query = h.listing.by_hashtag("python", None).unwrap();
    assert_eq!(query.count().unwrap(), 16);
    assert_eq!(h.transport.requests().len(), 2);

    let page = Page::from_query(&query, "/hashtags/python/", 10, 0).unwrap();
    assert_eq!(page.count, 16);
    assert_eq!(page.results.len(), 10);
    assert_eq!(page.results[0].text, "Tweet number 30 #python");
    assert_eq!(page.results[0].hashtags, vec!["#python".to_string()]);
    assert_eq!(page.results[0].account.href, "/gvanrossum");
    assert_eq!(page.next.as_deref(), Some("/hashtags/python/?limit=10&offset=10"));
    assert_eq!(page.previous, None);
}

#[test]
fn test_limit_caps_fetched_records() {
    let h = harness(FixtureTransport::from_bodies(bodies()), true);

    let query = h.listing.by_username("gvanrossum", Some(10)).unwrap();
    assert_eq!(query.count().unwrap(), 5);

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("q"), Some("from:gvanrossum"));
    assert_eq!(requests[0].param("count"), Some("10"));
}

#[test]
fn test_rescrape_does_not_duplicate() {
    let h = harness(FixtureTransport::from_bodies(bodies()), true);

    h.listing.by_hashtag("python", None).unwrap();
    let query = h.listing.by_hashtag("PYTHON", None).unwrap();

    assert_eq!(query.count().unwrap(), 16);
    assert_eq!(h.transport.requests().len(), 4);
}

#[test]
fn test_cached_fetch_skips_upstream() {
    let h = harness(FixtureTransport::from_bodies(bodies()), false);

    h.listing.by_hashtag("python", None).unwrap();
    let query = h.listing.by_hashtag("python", None).unwrap();

    assert_eq!(query.count().unwrap(), 16);
    assert_eq!(h.transport.requests().len(), 2);
}

#[test]
fn test_rate_limit_serves_stored_rows() {
    let mut replies: Vec<HttpReply> = bodies()
        .into_iter()
        .take(1)
        .map(|body| HttpReply {
            status: 200,
            body: body.to_string(),
        })
        .collect();
    replies.push(HttpReply {
        status: 429,
        body: json!({"errors": [{"code": 88, "message": "Rate limit exceeded"}]}).to_string(),
    });
    let h = harness(FixtureTransport::new(replies), true);

    let query = h.listing.by_hashtag("python", None).unwrap();
    assert_eq!(query.count().unwrap(), 8);
    assert!(matches!(
        h.resource.limiter().state(),
        RateLimitState::Suppressed { .. }
    ));

    // Suppressed: nothing is sent, stored rows are still listed.
    let query = h.listing.by_hashtag("python", None).unwrap();
    assert_eq!(query.count().unwrap(), 8);
    assert_eq!(h.transport.requests().len(), 2);
}

#[test]
fn test_invalid_filters_propagate() {
    let h = harness(FixtureTransport::from_bodies(bodies()), true);

    assert!(h.listing.by_hashtag("", None).is_err());
    assert!(h.transport.requests().is_empty());
}

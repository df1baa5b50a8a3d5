//! Scraping pipeline.
//!
//! - `paginator`: Lazy page-by-page iteration with budgets
//! - `rate_limit`: Upstream rate-limit suppression window
//! - `cache`: Memoization of lazy fetches
//! - `validate`: Raw record validation
//! - `persist`: Per-record persistence
//! - `listing`: Fetch, persist and query use case
//! - `health`: Upstream API health check

pub mod cache;
pub mod health;
pub mod listing;
pub mod paginator;
pub mod persist;
pub mod rate_limit;
pub mod validate;

pub use cache::{Fetch, Memoize, Produces};
pub use health::{ApiStatus, check_api_status};
pub use listing::{FetchParams, ListTweets, TweetFetcher};
pub use paginator::{Budget, PageSource, Paginator};
pub use persist::{persist, populate};
pub use rate_limit::{Clock, MonotonicClock, RateLimitState, RateLimiter, RateLimiterConfig, SharedClock};
pub use validate::validate;

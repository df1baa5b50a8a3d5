//! Data models for the scraper.
//!
//! - `config`: Application configuration
//! - `tweet`: Raw, validated and persisted tweet shapes
//! - `view`: JSON shapes served by the listings

pub mod config;
pub mod tweet;
pub mod view;

pub use config::{ApiConfig, CacheBackendKind, ClientKind, Config, ListingConfig, ScraperConfig};
pub use tweet::{Account, AccountData, Hashtag, HashtagData, RawRecord, Tweet, TweetData};
pub use view::{AccountView, Page, TweetView};

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Prefix for environment variables that override API credentials.
pub const ENV_PREFIX: &str = "SEARCH_TWEETS_API_V1_1_";

/// Longest accepted cache lifetime (one year).
pub const MAX_CACHE_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream search API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Fetch behavior (client, cache, rate limiting)
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Listing defaults
    #[serde(default)]
    pub listing: ListingConfig,

    /// Tweet database location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            let mut config = Self::default();
            config.apply_env();
            config
        })
    }

    /// Override credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Override credentials using an arbitrary variable lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let api = &mut self.api;
        let fields: [(&str, &mut String); 4] = [
            ("CONSUMER_KEY", &mut api.consumer_key),
            ("CONSUMER_SECRET", &mut api.consumer_secret),
            ("ACCESS_TOKEN", &mut api.access_token),
            ("ACCESS_TOKEN_SECRET", &mut api.access_token_secret),
        ];
        for (suffix, field) in fields {
            if let Some(value) = lookup(&format!("{ENV_PREFIX}{suffix}")) {
                *field = value;
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api.base_url)
            .map_err(|e| AppError::validation(format!("api.base_url is invalid: {e}")))?;
        if self.api.max_limit == 0 {
            return Err(AppError::validation("api.max_limit must be > 0"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.listing.default_limit == 0 {
            return Err(AppError::validation("listing.default_limit must be > 0"));
        }
        if self.scraper.rate_limit_wait_secs == 0 {
            return Err(AppError::validation(
                "scraper.rate_limit_wait_secs must be > 0",
            ));
        }
        if self.scraper.cache_timeout_secs > MAX_CACHE_TIMEOUT_SECS {
            return Err(AppError::validation(format!(
                "scraper.cache_timeout_secs must be <= {MAX_CACHE_TIMEOUT_SECS}"
            )));
        }
        if self.scraper.max_cached_items == 0 {
            return Err(AppError::validation("scraper.max_cached_items must be > 0"));
        }
        if self.scraper.client == ClientKind::V1_1 && !self.api.has_credentials() {
            return Err(AppError::validation(format!(
                "API credentials missing (set [api] keys or {ENV_PREFIX}* variables)"
            )));
        }
        Ok(())
    }
}

/// Upstream search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root; `search/tweets.json` is joined onto it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Largest page size the API accepts
    #[serde(default = "defaults::max_limit")]
    pub max_limit: usize,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
}

impl ApiConfig {
    /// Whether all four OAuth credentials are present.
    pub fn has_credentials(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token,
            &self.access_token_secret,
        ]
        .iter()
        .all(|value| !value.trim().is_empty())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            max_limit: defaults::max_limit(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
        }
    }
}

/// Which transport the search gateway talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientKind {
    /// Live v1.1 search API over HTTPS
    #[default]
    #[serde(rename = "v1_1")]
    V1_1,
    /// Recorded responses read from `fixture_path`
    #[serde(rename = "fixture")]
    Fixture,
}

/// Where memoized fetches are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Local,
}

/// Fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub client: ClientKind,

    /// Recorded bodies for the fixture client
    #[serde(default = "defaults::fixture_path")]
    pub fixture_path: PathBuf,

    /// Bypass the fetch cache and always hit upstream
    #[serde(default = "defaults::live")]
    pub live: bool,

    #[serde(default)]
    pub cache_backend: CacheBackendKind,

    /// Directory for the local cache backend
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Lifetime of a cached fetch in seconds
    #[serde(default = "defaults::cache_timeout")]
    pub cache_timeout_secs: u64,

    /// Fetches yielding more items than this are not cached
    #[serde(default = "defaults::max_cached_items")]
    pub max_cached_items: usize,

    /// Suppression window after the API reports a rate limit
    #[serde(default = "defaults::rate_limit_wait")]
    pub rate_limit_wait_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            client: ClientKind::default(),
            fixture_path: defaults::fixture_path(),
            live: defaults::live(),
            cache_backend: CacheBackendKind::default(),
            cache_dir: defaults::cache_dir(),
            cache_timeout_secs: defaults::cache_timeout(),
            max_cached_items: defaults::max_cached_items(),
            rate_limit_wait_secs: defaults::rate_limit_wait(),
        }
    }
}

/// Listing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Limit used when a request carries none
    #[serde(default = "defaults::default_limit")]
    pub default_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::default_limit(),
        }
    }
}

/// Tweet database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: defaults::database_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn base_url() -> String {
        "https://api.twitter.com/1.1/".into()
    }
    pub fn max_limit() -> usize {
        100
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "tweet-scraper/0.1".into()
    }

    // Scraper defaults
    pub fn fixture_path() -> PathBuf {
        PathBuf::from("storage/fixtures/search.json")
    }
    pub fn live() -> bool {
        true
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("storage/cache")
    }
    pub fn cache_timeout() -> u64 {
        10
    }
    pub fn max_cached_items() -> usize {
        10_000
    }
    pub fn rate_limit_wait() -> u64 {
        15 * 60
    }

    // Listing defaults
    pub fn default_limit() -> usize {
        30
    }

    // Storage defaults
    pub fn database_path() -> PathBuf {
        PathBuf::from("storage/tweets.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> Config {
        let mut config = Config::default();
        config.api.consumer_key = "ck".into();
        config.api.consumer_secret = "cs".into();
        config.api.access_token = "at".into();
        config.api.access_token_secret = "ats".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.max_limit, 100);
        assert_eq!(config.listing.default_limit, 30);
        assert_eq!(config.scraper.cache_timeout_secs, 10);
        assert_eq!(config.scraper.max_cached_items, 10_000);
        assert_eq!(config.scraper.rate_limit_wait_secs, 900);
        assert!(config.scraper.live);
        assert_eq!(config.scraper.client, ClientKind::V1_1);
    }

    #[test]
    fn test_validate_requires_credentials_for_live_client() {
        assert!(Config::default().validate().is_err());
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn test_fixture_client_needs_no_credentials() {
        let mut config = Config::default();
        config.scraper.client = ClientKind::Fixture;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = with_credentials();
        config.api.max_limit = 0;
        assert!(config.validate().is_err());

        let mut config = with_credentials();
        config.listing.default_limit = 0;
        assert!(config.validate().is_err());

        let mut config = with_credentials();
        config.scraper.rate_limit_wait_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_cache_timeout() {
        let mut config = with_credentials();
        config.scraper.cache_timeout_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));

        config.scraper.cache_timeout_secs = MAX_CACHE_TIMEOUT_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = with_credentials();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [scraper]
            client = "fixture"
            live = false
            cache_backend = "local"

            [listing]
            default_limit = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.scraper.client, ClientKind::Fixture);
        assert_eq!(config.scraper.cache_backend, CacheBackendKind::Local);
        assert!(!config.scraper.live);
        assert_eq!(config.listing.default_limit, 12);
        assert_eq!(config.api.max_limit, 100);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = Config::default();
        config.api.consumer_key = "from-file".into();
        config.apply_env_with(|key| match key {
            "SEARCH_TWEETS_API_V1_1_CONSUMER_KEY" => Some("from-env".into()),
            "SEARCH_TWEETS_API_V1_1_ACCESS_TOKEN" => Some("token".into()),
            _ => None,
        });

        assert_eq!(config.api.consumer_key, "from-env");
        assert_eq!(config.api.access_token, "token");
        assert_eq!(config.api.consumer_secret, "");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nmax_limit = 50\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.max_limit, 50);
    }
}

// src/services/search.rs

//! Search gateway for the v1.1 `search/tweets.json` endpoint.
//!
//! [`SearchTweetsResource::get`] validates the filter, then lazily pages
//! through results. Every page fetch goes through the rate limiter, so a
//! 429 on any page starts the suppression window and ends the stream.
//! Other upstream and transport failures are logged and read as an empty
//! page. [`SearchTweetsResource::check`] sends a single first page and
//! returns those failures instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GatewayError;
use crate::models::{ApiConfig, RawRecord};
use crate::pipeline::paginator::{Budget, PageSource, Paginator};
use crate::pipeline::rate_limit::{MonotonicClock, RateLimiter, RateLimiterConfig, SharedClock};
use crate::services::oauth::Credentials;
use crate::services::response::SearchResponse;
use crate::services::transport::{HttpRequest, Transport};
use crate::storage::TweetFilter;
use crate::utils;

const SEARCH_PATH: &str = "search/tweets.json";
const FILTER_NAMES: &str = "hashtag, username";

/// Named search filters. Exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SearchFilters {
    pub fn hashtag(value: impl Into<String>) -> Self {
        Self {
            hashtag: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn username(value: impl Into<String>) -> Self {
        Self {
            username: Some(value.into()),
            ..Self::default()
        }
    }

    /// Resolve to the single active filter. Empty values count as unset.
    pub fn validate(&self) -> Result<TweetFilter, GatewayError> {
        let active = |value: &Option<String>| value.as_deref().filter(|v| !v.is_empty()).map(str::to_string);
        match (active(&self.hashtag), active(&self.username)) {
            (Some(tag), None) => Ok(TweetFilter::Hashtag(tag)),
            (None, Some(name)) => Ok(TweetFilter::Username(name)),
            _ => Err(GatewayError::InvalidFilters(format!(
                "filter must be exactly one of {FILTER_NAMES} with a non-empty value"
            ))),
        }
    }
}

/// Server-side query fragment for a filter.
pub fn query_fragment(filter: &TweetFilter) -> String {
    match filter {
        TweetFilter::Hashtag(tag) => format!("#{tag}"),
        TweetFilter::Username(name) => format!("from:{name}"),
    }
}

/// Gateway to the upstream search API.
pub struct SearchTweetsResource {
    transport: Arc<dyn Transport>,
    credentials: Option<Credentials>,
    endpoint: Url,
    max_limit: usize,
    limiter: RateLimiter<SharedClock>,
}

impl SearchTweetsResource {
    /// Build a gateway with the default 15 minute rate-limit window.
    ///
    /// Requests are signed only when all credentials are configured.
    pub fn new(api: &ApiConfig, transport: Arc<dyn Transport>) -> Result<Self, GatewayError> {
        let endpoint = utils::endpoint(&api.base_url, SEARCH_PATH)
            .map_err(|e| GatewayError::Endpoint(format!("{}: {e}", api.base_url)))?;
        let credentials = api.has_credentials().then(|| Credentials::from_config(api));
        let clock: SharedClock = Arc::new(MonotonicClock::new());

        Ok(Self {
            transport,
            credentials,
            endpoint,
            max_limit: api.max_limit.max(1),
            limiter: RateLimiter::with_clock(RateLimiterConfig::default(), clock),
        })
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter<SharedClock>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &RateLimiter<SharedClock> {
        &self.limiter
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Parameters for the first page of a search.
    pub fn first_page_params(
        &self,
        filter: &TweetFilter,
        limit: Option<usize>,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("q".to_string(), query_fragment(filter)),
            ("include_entities".to_string(), "1".to_string()),
            ("result_type".to_string(), "recent".to_string()),
        ];
        if let Some(limit) = limit.filter(|l| *l > 0) {
            params.push(("count".to_string(), limit.min(self.max_limit).to_string()));
        }
        params
    }

    /// Sign and send one request, surfacing every failure.
    fn send(&self, params: &[(String, String)]) -> Result<SearchResponse, GatewayError> {
        let authorization = self
            .credentials
            .as_ref()
            .map(|c| c.authorization("GET", &self.endpoint, params))
            .transpose()?;
        let request = HttpRequest {
            url: self.endpoint.clone(),
            params: params.to_vec(),
            authorization,
        };
        SearchResponse::from_reply(self.transport.get(&request)?)
    }

    /// Send one request. Only the rate-limit signal is returned as an
    /// error; anything else is logged and becomes an empty page.
    pub fn request(&self, params: &[(String, String)]) -> Result<SearchResponse, GatewayError> {
        match self.send(params) {
            Err(e) if e.is_rate_limited() => Err(e),
            Err(e) => {
                log::error!("Search request failed: {}", e);
                Ok(SearchResponse::empty())
            }
            ok => ok,
        }
    }

    /// Rate-limited page fetch; suppressed calls read as an empty page.
    fn fetch_page(&self, params: &[(String, String)]) -> SearchResponse {
        self.limiter
            .call(|| self.request(params), SearchResponse::empty)
            .unwrap_or_else(|e| {
                log::error!("Search request failed: {}", e);
                SearchResponse::empty()
            })
    }

    /// Send the first page of a search and return the reply unmasked.
    ///
    /// A 429 still opens the suppression window and reads as an empty page,
    /// and nothing is sent while suppressed.
    pub fn check(
        &self,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<SearchResponse, GatewayError> {
        let filter = filters.validate()?;
        let params = self.first_page_params(&filter, limit);
        self.limiter.call(|| self.send(&params), SearchResponse::empty)
    }

    /// Lazily fetch normalized records matching `filters`.
    ///
    /// `limit` caps the number of records yielded and the page size.
    /// Fails only when the filters are invalid; nothing is sent then.
    pub fn get<'a>(
        &'a self,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<Box<dyn Iterator<Item = RawRecord> + 'a>, GatewayError> {
        let filter = filters.validate()?;
        let pages = SearchPages {
            resource: self,
            first: self.first_page_params(&filter, limit),
            count: limit.map_or(self.max_limit, |l| l.clamp(1, self.max_limit)),
        };
        let paginator = Paginator::with_budget(pages, Budget::new(None, limit));
        Ok(Box::new(paginator.into_produce()))
    }
}

/// One search run seen as a page source.
struct SearchPages<'a> {
    resource: &'a SearchTweetsResource,
    first: Vec<(String, String)>,
    count: usize,
}

impl PageSource for SearchPages<'_> {
    type Page = SearchResponse;
    type Item = RawRecord;

    fn first_page(&self) -> SearchResponse {
        self.resource.fetch_page(&self.first)
    }

    fn items(&self, page: &SearchResponse) -> Vec<RawRecord> {
        page.records()
    }

    fn has_next_page(&self, page: &SearchResponse) -> bool {
        page.has_next_page()
    }

    fn next_page(&self, prev: &SearchResponse) -> SearchResponse {
        match prev.next_page_params(self.count) {
            Some(params) => self.resource.fetch_page(&params),
            None => {
                log::warn!("Unusable next_results cursor, stopping pagination");
                SearchResponse::empty()
            }
        }
    }
}

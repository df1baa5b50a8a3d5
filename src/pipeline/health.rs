// src/pipeline/health.rs

//! Upstream API health check.

use serde::Serialize;

use crate::pipeline::rate_limit::RateLimitState;
use crate::services::{SearchFilters, SearchTweetsResource};

/// Outcome of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiStatus {
    pub healthy: bool,
    pub rate_limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query the search API with one small hashtag and one small user search.
///
/// Goes through [`SearchTweetsResource::check`], so rejected credentials,
/// unreachable hosts and malformed replies all mark the API unhealthy.
pub fn check_api_status(gateway: &SearchTweetsResource) -> ApiStatus {
    let searches = [SearchFilters::hashtag("test"), SearchFilters::username("jack")];

    for filters in &searches {
        if let Err(e) = gateway.check(filters, Some(1)) {
            log::error!("API health check failed: {}", e);
            return ApiStatus {
                healthy: false,
                rate_limited: e.is_rate_limited(),
                error: Some(e.to_string()),
            };
        }
    }

    match gateway.limiter().state() {
        RateLimitState::Open => ApiStatus {
            healthy: true,
            rate_limited: false,
            error: None,
        },
        RateLimitState::Suppressed { remaining } => {
            log::warn!("API is rate limited for another {}s", remaining.as_secs());
            ApiStatus {
                healthy: false,
                rate_limited: true,
                error: Some(format!("rate limited, retry in {}s", remaining.as_secs())),
            }
        }
    }
}

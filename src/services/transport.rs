// src/services/transport.rs

//! HTTP transport seam for the search gateway.
//!
//! - [`HttpTransport`]: blocking reqwest client
//! - [`FixtureTransport`]: serves recorded response bodies in order

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, GatewayError};
use crate::models::ApiConfig;

/// An outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: Url,
    pub params: Vec<(String, String)>,
    /// Value for the `Authorization` header, if signed
    pub authorization: Option<String>,
}

impl HttpRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the upstream API.
pub trait Transport: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<HttpReply, GatewayError>;
}

/// Transport over a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a configured HTTP client.
    pub fn new(api: &ApiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(api.user_agent.as_str())
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpReply, GatewayError> {
        let mut builder = self.client.get(request.url.clone()).query(&request.params);
        if let Some(auth) = &request.authorization {
            let value = HeaderValue::from_str(auth)
                .map_err(|e| GatewayError::Signing(e.to_string()))?;
            builder = builder.header(AUTHORIZATION, value);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        log::debug!("GET {} -> {}", request.url, status);
        Ok(HttpReply { status, body })
    }
}

/// Serves recorded bodies: the first for a request without `max_id`, the
/// next one for every request that carries it. Past the end it answers
/// with an empty result set.
#[derive(Debug)]
pub struct FixtureTransport {
    replies: Vec<HttpReply>,
    cursor: Mutex<usize>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FixtureTransport {
    pub fn new(replies: Vec<HttpReply>) -> Self {
        Self {
            replies,
            cursor: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every body answered with status 200.
    pub fn from_bodies(bodies: impl IntoIterator<Item = Value>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|body| HttpReply {
                    status: 200,
                    body: body.to_string(),
                })
                .collect(),
        )
    }

    /// Load a JSON array of response bodies.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let content = fs::read_to_string(path.as_ref())?;
        let bodies: Vec<Value> = serde_json::from_str(&content)?;
        log::info!(
            "Loaded {} recorded responses from {}",
            bodies.len(),
            path.as_ref().display()
        );
        Ok(Self::from_bodies(bodies))
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Transport for FixtureTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpReply, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| GatewayError::Transport("fixture cursor poisoned".into()))?;
        let index = if request.param("max_id").is_some() {
            *cursor += 1;
            *cursor
        } else {
            *cursor = 0;
            0
        };

        Ok(self.replies.get(index).cloned().unwrap_or_else(|| HttpReply {
            status: 200,
            body: r#"{"statuses": [], "search_metadata": {}}"#.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(max_id: Option<&str>) -> HttpRequest {
        let mut params = vec![("q".to_string(), "#rust".to_string())];
        if let Some(id) = max_id {
            params.push(("max_id".to_string(), id.to_string()));
        }
        HttpRequest {
            url: Url::parse("https://example.com/search/tweets.json").unwrap(),
            params,
            authorization: None,
        }
    }

    #[test]
    fn test_fixture_serves_in_order() {
        let transport = FixtureTransport::from_bodies([json!({"page": 1}), json!({"page": 2})]);

        let first = transport.get(&request(None)).unwrap();
        let second = transport.get(&request(Some("10"))).unwrap();
        let third = transport.get(&request(Some("5"))).unwrap();

        assert_eq!(first.body, json!({"page": 1}).to_string());
        assert_eq!(second.body, json!({"page": 2}).to_string());
        assert!(third.body.contains("statuses"));
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_fixture_restarts_without_max_id() {
        let transport = FixtureTransport::from_bodies([json!({"page": 1}), json!({"page": 2})]);

        transport.get(&request(None)).unwrap();
        transport.get(&request(Some("10"))).unwrap();
        let again = transport.get(&request(None)).unwrap();
        assert_eq!(again.body, json!({"page": 1}).to_string());
    }

    #[test]
    fn test_fixture_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("search.json");
        fs::write(&path, r#"[{"statuses": []}]"#).unwrap();

        let transport = FixtureTransport::load(&path).unwrap();
        assert!(transport.get(&request(None)).unwrap().is_success());
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&ApiConfig::default()).is_ok());
    }
}

// src/services/response.rs

//! Search API response parsing.
//!
//! Upstream statuses are normalized into the flat record shape the
//! validation stage expects. A status missing a field (or carrying a
//! malformed one) is logged and skipped; the rest of the page survives.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use url::form_urlencoded;

use crate::error::GatewayError;
use crate::models::RawRecord;
use crate::services::transport::HttpReply;

/// Upstream timestamp format, e.g. `Thu Jun 10 23:25:09 +0000 2021`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Why a single status could not be normalized.
#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("malformed field `{0}`")]
    Malformed(&'static str),
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    status: u16,
    body: Value,
}

impl SearchResponse {
    /// A page with no results and no continuation.
    pub fn empty() -> Self {
        Self {
            status: 200,
            body: json!({}),
        }
    }

    /// Check the status and decode the body.
    pub fn from_reply(reply: HttpReply) -> Result<Self, GatewayError> {
        if !reply.is_success() {
            return Err(GatewayError::upstream(reply.status));
        }
        let body = if reply.body.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&reply.body)?
        };
        Ok(Self {
            status: reply.status,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw statuses as sent by the API.
    pub fn statuses(&self) -> Vec<&Value> {
        match self.body.get("statuses") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        }
    }

    /// Normalized records; unparseable statuses are skipped.
    pub fn records(&self) -> Vec<RawRecord> {
        self.statuses()
            .into_iter()
            .filter_map(|item| match normalize(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::error!("Skipping upstream status: {}", e);
                    None
                }
            })
            .collect()
    }

    fn next_results(&self) -> Option<&str> {
        self.body
            .get("search_metadata")?
            .get("next_results")?
            .as_str()
    }

    pub fn has_next_page(&self) -> bool {
        self.next_results().is_some()
    }

    /// Request parameters for the following page, with `count` substituted.
    pub fn next_page_params(&self, count: usize) -> Option<Vec<(String, String)>> {
        let query = self.next_results()?;
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let take = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(k, v)| (k.clone(), v.clone()))
        };

        Some(vec![
            take("max_id")?,
            take("q")?,
            ("count".to_string(), count.to_string()),
            take("result_type")?,
            take("include_entities")?,
        ])
    }
}

fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value, ItemError> {
    value.get(name).ok_or(ItemError::Missing(name))
}

/// Integers may arrive as JSON numbers or numeric strings.
fn int(value: &Value, name: &'static str) -> Result<Value, ItemError> {
    match field(value, name)? {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| s.trim().parse::<u64>().map(Value::from))
            .map_err(|_| ItemError::Malformed(name)),
        _ => Err(ItemError::Malformed(name)),
    }
}

fn string(value: &Value, name: &'static str) -> Result<Value, ItemError> {
    match field(value, name)? {
        Value::String(s) => Ok(Value::String(s.clone())),
        _ => Err(ItemError::Malformed(name)),
    }
}

fn created_at(value: &Value) -> Result<Value, ItemError> {
    let raw = field(value, "created_at")?
        .as_str()
        .ok_or(ItemError::Malformed("created_at"))?;
    let parsed = DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map_err(|_| ItemError::Malformed("created_at"))?;
    Ok(Value::String(parsed.with_timezone(&Utc).to_rfc3339()))
}

fn hashtags(value: &Value) -> Result<Value, ItemError> {
    let entities = field(value, "entities")?;
    let tags: Vec<&Value> = match entities.get("hashtags") {
        Some(Value::Array(tags)) => tags.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    };
    tags.into_iter()
        .map(|tag| -> Result<Value, ItemError> { Ok(json!({ "name": string(tag, "text")? })) })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn normalize(item: &Value) -> Result<RawRecord, ItemError> {
    let user = field(item, "user")?;
    Ok(json!({
        "tweet_id": int(item, "id")?,
        "account": {
            "fullname": string(user, "name")?,
            "username": string(user, "screen_name")?,
            "twitter_id": int(user, "id")?,
        },
        "created_at": created_at(item)?,
        "hashtags": hashtags(item)?,
        "like_count": int(item, "favorite_count")?,
        "reply_count": 0,
        "retweet_count": int(item, "retweet_count")?,
        "text": string(item, "text")?,
    }))
}

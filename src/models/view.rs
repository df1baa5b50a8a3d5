//! JSON shapes returned by the listing endpoints.

use serde::Serialize;
use url::form_urlencoded;

use crate::error::StoreError;
use crate::models::{Account, Tweet};
use crate::storage::TweetQuery;

/// Display format for tweet timestamps, e.g. `" 1:05 PM - 10 Jun 2021"`.
pub const DATE_FORMAT: &str = "%l:%M %p - %d %b %Y";

/// Account as rendered inside a tweet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub fullname: String,
    pub href: String,
    pub id: u64,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            fullname: account.fullname.clone(),
            href: format!("/{}", account.username),
            id: account.twitter_id,
        }
    }
}

/// Tweet as rendered in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TweetView {
    pub account: AccountView,
    pub date: String,
    pub hashtags: Vec<String>,
    pub likes: u64,
    pub replies: u64,
    pub retweets: u64,
    pub text: String,
}

impl From<&Tweet> for TweetView {
    fn from(tweet: &Tweet) -> Self {
        Self {
            account: AccountView::from(&tweet.account),
            date: tweet.created_at.format(DATE_FORMAT).to_string(),
            hashtags: tweet
                .hashtags
                .iter()
                .map(|h| format!("#{}", h.name))
                .collect(),
            likes: tweet.like_count,
            replies: tweet.reply_count,
            retweets: tweet.retweet_count,
            text: tweet.text.clone(),
        }
    }
}

/// Limit/offset page envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl Page<TweetView> {
    /// Render one page of a query result.
    ///
    /// `path` is the listing path the links point back to
    /// (e.g. `/hashtags/rust/`).
    pub fn from_query(
        query: &TweetQuery<'_>,
        path: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Self, StoreError> {
        let count = query.count()?;
        let results = query.page(limit, offset)?.iter().map(TweetView::from).collect();

        Ok(Self {
            count,
            next: next_link(path, count, limit, offset),
            previous: previous_link(path, limit, offset),
            results,
        })
    }
}

fn link(path: &str, limit: usize, offset: Option<usize>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("limit", &limit.to_string());
    if let Some(offset) = offset {
        query.append_pair("offset", &offset.to_string());
    }
    format!("{}?{}", path, query.finish())
}

fn next_link(path: &str, count: usize, limit: usize, offset: usize) -> Option<String> {
    let next = offset.saturating_add(limit);
    if limit == 0 || next >= count {
        return None;
    }
    Some(link(path, limit, Some(next)))
}

fn previous_link(path: &str, limit: usize, offset: usize) -> Option<String> {
    if offset == 0 {
        return None;
    }
    if offset <= limit {
        return Some(link(path, limit, None));
    }
    Some(link(path, limit, Some(offset - limit)))
}

//! Upstream search API client.
//!
//! - `search`: Filter validation, pagination and rate limiting
//! - `response`: Response parsing into raw records
//! - `oauth`: Request signing
//! - `transport`: HTTP and recorded-response transports

pub mod oauth;
pub mod response;
pub mod search;
pub mod transport;

pub use oauth::Credentials;
pub use response::SearchResponse;
pub use search::{SearchFilters, SearchTweetsResource};
pub use transport::{FixtureTransport, HttpReply, HttpRequest, HttpTransport, Transport};

//! Utility functions and helpers.

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::models::RawRecord;

/// Cache key for a named operation called with `args`.
///
/// The arguments are hashed so keys stay short and filesystem-safe.
pub fn cache_key(name: &str, args: &impl Serialize) -> serde_json::Result<String> {
    let encoded = serde_json::to_vec(args)?;
    let digest = Sha256::digest(&encoded);
    Ok(format!("{}:{}", name, hex::encode(digest)))
}

/// Treat a JSON array as a sequence of records and anything else as one.
pub fn enforce_sequence(value: RawRecord) -> Vec<RawRecord> {
    match value {
        RawRecord::Array(items) => items,
        other => vec![other],
    }
}

/// Join a relative path onto an API root, keeping the root's last segment.
pub fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
}

// src/pipeline/validate.rs

use crate::models::{RawRecord, TweetData};

/// Lazily validate raw records, dropping the ones that fail the schema.
///
/// Accepts anything iterable: a `Vec`, a fetch stream, or `[record]` for a
/// single record. Use [`crate::utils::enforce_sequence`] to split a JSON
/// value that may be either one record or an array.
pub fn validate<I>(records: I) -> impl Iterator<Item = TweetData>
where
    I: IntoIterator<Item = RawRecord>,
{
    records
        .into_iter()
        .filter_map(|raw| match TweetData::from_raw(raw) {
            Ok(tweet) => Some(tweet),
            Err(e) => {
                log::debug!("Dropping invalid record: {}", e);
                None
            }
        })
}

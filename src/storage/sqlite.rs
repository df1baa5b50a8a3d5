//! SQLite tweet store.
//!
//! Schema:
//!
//! ```text
//! accounts(id, fullname, username, twitter_id UNIQUE)
//! hashtags(id, name UNIQUE)
//! tweets(id, tweet_id UNIQUE, account_id → accounts, created_at,
//!        like_count, reply_count, retweet_count, text)
//! tweet_hashtags(tweet_id → tweets, hashtag_id → hashtags, position)
//! ```
//!
//! Hashtag names are stored as given and matched case-insensitively
//! (ASCII folding, SQLite `NOCASE`).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use crate::error::{AppError, StoreError};
use crate::models::tweet::MAX_TEXT_CHARS;
use crate::models::{Account, AccountData, Hashtag, Tweet, TweetData};
use crate::storage::{TweetFilter, TweetStore};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    fullname    TEXT    NOT NULL,
    username    TEXT    NOT NULL,
    twitter_id  INTEGER NOT NULL UNIQUE CHECK (twitter_id >= 0)
);

CREATE TABLE IF NOT EXISTS hashtags (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tweets (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    tweet_id       INTEGER NOT NULL UNIQUE CHECK (tweet_id >= 0),
    account_id     INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    created_at     TEXT    NOT NULL,
    like_count     INTEGER NOT NULL CHECK (like_count >= 0),
    reply_count    INTEGER NOT NULL CHECK (reply_count >= 0),
    retweet_count  INTEGER NOT NULL CHECK (retweet_count >= 0),
    text           TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS tweet_hashtags (
    tweet_id    INTEGER NOT NULL REFERENCES tweets(id) ON DELETE CASCADE,
    hashtag_id  INTEGER NOT NULL REFERENCES hashtags(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    PRIMARY KEY (tweet_id, hashtag_id)
);

CREATE INDEX IF NOT EXISTS idx_tweets_account ON tweets(account_id);
CREATE INDEX IF NOT EXISTS idx_tweet_hashtags_hashtag ON tweet_hashtags(hashtag_id);
";

const SELECT_TWEETS: &str = "
SELECT t.id, t.tweet_id, t.created_at, t.like_count, t.reply_count, t.retweet_count, t.text,
       a.id, a.fullname, a.username, a.twitter_id
FROM tweets t
JOIN accounts a ON a.id = t.account_id";

const HASHTAG_CLAUSE: &str = "
WHERE EXISTS (
    SELECT 1 FROM tweet_hashtags th
    JOIN hashtags h ON h.id = th.hashtag_id
    WHERE th.tweet_id = t.id AND h.name = ?1 COLLATE NOCASE
)";

const USERNAME_CLAUSE: &str = "
WHERE a.username = ?1";

/// Tweet store on a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        log::info!("Opened tweet database at {}", path.display());
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }
}

fn to_sql_int(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::invalid(format!("{field} out of range: {value}")))
}

fn from_sql_int(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Integer,
        Box::new(e),
    ))
}

/// Field checks the schema cannot express.
fn clean(tweet: &TweetData) -> Result<(), StoreError> {
    let chars = tweet.text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(StoreError::invalid(format!(
            "text has {chars} characters (max {MAX_TEXT_CHARS})"
        )));
    }
    if tweet.account.username.is_empty() {
        return Err(StoreError::invalid("account username is empty"));
    }
    if tweet.hashtags.iter().any(|h| h.name.is_empty()) {
        return Err(StoreError::invalid("hashtag name is empty"));
    }
    Ok(())
}

fn get_or_create_account(tx: &Transaction<'_>, data: &AccountData) -> Result<Account, StoreError> {
    let twitter_id = to_sql_int(data.twitter_id, "twitter_id")?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM accounts WHERE fullname = ?1 AND username = ?2 AND twitter_id = ?3",
            params![data.fullname, data.username, twitter_id],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing {
        Some(id) => id,
        None => {
            tx.execute(
                "INSERT INTO accounts (fullname, username, twitter_id) VALUES (?1, ?2, ?3)",
                params![data.fullname, data.username, twitter_id],
            )?;
            tx.last_insert_rowid()
        }
    };

    Ok(Account {
        id,
        fullname: data.fullname.clone(),
        username: data.username.clone(),
        twitter_id: data.twitter_id,
    })
}

fn get_or_create_hashtag(tx: &Transaction<'_>, name: &str) -> Result<Hashtag, StoreError> {
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM hashtags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;

    let id = match existing {
        Some(id) => id,
        None => {
            tx.execute("INSERT INTO hashtags (name) VALUES (?1)", params![name])?;
            tx.last_insert_rowid()
        }
    };

    Ok(Hashtag {
        id,
        name: name.to_string(),
    })
}

fn hashtags_of(conn: &Connection, tweet_row: i64) -> rusqlite::Result<Vec<Hashtag>> {
    let mut stmt = conn.prepare_cached(
        "SELECT h.id, h.name FROM tweet_hashtags th
         JOIN hashtags h ON h.id = th.hashtag_id
         WHERE th.tweet_id = ?1
         ORDER BY th.position",
    )?;
    let rows = stmt.query_map(params![tweet_row], |row| {
        Ok(Hashtag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    let created_at: DateTime<Utc> = row.get(2)?;
    Ok(Tweet {
        id: row.get(0)?,
        tweet_id: from_sql_int(row, 1)?,
        created_at,
        like_count: from_sql_int(row, 3)?,
        reply_count: from_sql_int(row, 4)?,
        retweet_count: from_sql_int(row, 5)?,
        text: row.get(6)?,
        account: Account {
            id: row.get(7)?,
            fullname: row.get(8)?,
            username: row.get(9)?,
            twitter_id: from_sql_int(row, 10)?,
        },
        hashtags: Vec::new(),
    })
}

fn filter_clause(filter: &TweetFilter) -> (&'static str, &str) {
    match filter {
        TweetFilter::Hashtag(name) => (HASHTAG_CLAUSE, name.as_str()),
        TweetFilter::Username(name) => (USERNAME_CLAUSE, name.as_str()),
    }
}

impl TweetStore for SqliteStore {
    fn save_tweet(&self, tweet: &TweetData) -> Result<Tweet, StoreError> {
        clean(tweet)?;
        let tweet_id = to_sql_int(tweet.tweet_id, "tweet_id")?;
        let counts = [
            to_sql_int(tweet.like_count, "like_count")?,
            to_sql_int(tweet.reply_count, "reply_count")?,
            to_sql_int(tweet.retweet_count, "retweet_count")?,
        ];

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let account = get_or_create_account(&tx, &tweet.account)?;
        let hashtags = tweet
            .hashtag_names()
            .map(|name| get_or_create_hashtag(&tx, name))
            .collect::<Result<Vec<_>, _>>()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM tweets WHERE tweet_id = ?1",
                params![tweet_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Integrity(format!(
                "tweet {} already exists",
                tweet.tweet_id
            )));
        }

        tx.execute(
            "INSERT INTO tweets
                (tweet_id, account_id, created_at, like_count, reply_count, retweet_count, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tweet_id,
                account.id,
                tweet.created_at,
                counts[0],
                counts[1],
                counts[2],
                tweet.text
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (position, hashtag) in hashtags.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO tweet_hashtags (tweet_id, hashtag_id, position)
                 VALUES (?1, ?2, ?3)",
                params![id, hashtag.id, position as i64],
            )?;
        }

        tx.commit()?;

        let mut unique = Vec::with_capacity(hashtags.len());
        for hashtag in hashtags {
            if !unique.iter().any(|h: &Hashtag| h.id == hashtag.id) {
                unique.push(hashtag);
            }
        }

        Ok(Tweet {
            id,
            tweet_id: tweet.tweet_id,
            account,
            created_at: tweet.created_at,
            hashtags: unique,
            like_count: tweet.like_count,
            reply_count: tweet.reply_count,
            retweet_count: tweet.retweet_count,
            text: tweet.text.clone(),
        })
    }

    fn count(&self, filter: &TweetFilter) -> Result<usize, StoreError> {
        let (clause, value) = filter_clause(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM tweets t JOIN accounts a ON a.id = t.account_id {clause}"
        );
        let conn = self.conn()?;
        let count: i64 = conn.query_row(&sql, params![value], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn fetch(
        &self,
        filter: &TweetFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Tweet>, StoreError> {
        let (clause, value) = filter_clause(filter);
        let sql = format!("{SELECT_TWEETS} {clause} ORDER BY t.tweet_id DESC LIMIT ?2 OFFSET ?3");
        // SQLite reads a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut tweets = stmt
            .query_map(params![value, limit, offset], tweet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for tweet in &mut tweets {
            tweet.hashtags = hashtags_of(&conn, tweet.id)?;
        }
        Ok(tweets)
    }
}

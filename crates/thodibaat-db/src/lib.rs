pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Text shown in place of a soft-deleted message everywhere it surfaces.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Canonical timestamp format for every stored column: RFC3339 UTC with
/// microsecond precision. Fixed-width, so plain string comparison in SQL
/// orders chronologically.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A timestamp strictly greater than `ts`. Used to stamp a conversation's
/// first message after the conversation row itself, so a poll cursor equal
/// to the creation time still picks the message up.
pub(crate) fn strictly_after(ts: &str) -> String {
    let fresh = now_rfc3339();
    if fresh.as_str() > ts {
        return fresh;
    }
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|t| {
            (t.with_timezone(&Utc) + chrono::Duration::microseconds(1))
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        })
        .unwrap_or(fresh)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

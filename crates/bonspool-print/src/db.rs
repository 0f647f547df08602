// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared SQLite plumbing for the job store and printer registry.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;

use bonspool_core::error::{Result, SpoolError};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a file-backed connection with WAL journaling and foreign keys on.
pub(crate) fn open_file(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(db_err("open"))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err("WAL pragma"))?;
    configure(&conn)?;
    Ok(conn)
}

pub(crate) fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(db_err("busy timeout"))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(db_err("foreign_keys pragma"))?;
    Ok(())
}

/// Wrap a rusqlite error with the operation that produced it.
pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> SpoolError {
    move |e| SpoolError::Database(format!("{context}: {e}"))
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that text
/// comparison in SQL matches chronological order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Parse a text column through `FromStr`, reporting failures as conversion
/// errors on that column.
pub(crate) fn parse_col<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = SpoolError>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

//! Database access layer for casedesk-records
//!
//! Free async functions over a borrowed connection, so the engines can run
//! several of them inside one transaction. Schema creation and migrations
//! live in `casedesk_common::db`.

use casedesk_common::{time, Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

pub mod comments;
pub mod history;
pub mod records;
pub mod sequences;

pub use casedesk_common::db::init_database;

/// Start a transaction that holds the write lock from its first statement.
///
/// A deferred transaction that reads first cannot be upgraded once another
/// writer has committed in WAL mode; SQLite then reports `SQLITE_BUSY`
/// without honoring `busy_timeout`. Taking the lock up front makes
/// concurrent writers queue on the timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Maximum bound parameters per `IN (...)` list
pub(crate) const ID_CHUNK: usize = 500;

/// Append `(?, ?, ...)` binding every id as text
pub(crate) fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");
}

pub(crate) fn decode_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Corrupt {} '{}': {}", column, value, e)))
}

pub(crate) fn decode_uuid_opt(value: Option<&str>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| decode_uuid(v, column)).transpose()
}

pub(crate) fn decode_date_opt(value: Option<&str>, column: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|e| Error::Internal(format!("Corrupt {} '{}': {}", column, v, e)))
        })
        .transpose()
}

pub(crate) fn decode_ts(value: &str) -> Result<DateTime<Utc>> {
    time::from_db(value)
}

pub(crate) fn decode_ts_opt(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(time::from_db).transpose()
}

/// Parse a stored closed-set value; a bad value means the row is corrupt
pub(crate) fn decode_enum<T>(value: &str, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    value
        .parse()
        .map_err(|e| Error::Internal(format!("Corrupt {}: {}", column, e)))
}

pub(crate) fn decode_enum_opt<T>(value: Option<&str>, column: &str) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    value.map(|v| decode_enum(v, column)).transpose()
}

pub(crate) fn encode_date_opt(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

pub(crate) fn encode_uuid_opt(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

//! Named atomic counters

use casedesk_common::Result;
use sqlx::SqliteConnection;

/// Increment the named counter and return the new value.
///
/// A single upsert statement, so concurrent callers never observe the same
/// value. A missing counter starts at 1.
pub async fn next_value(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO id_sequences (name, value) VALUES (?, 1)
        ON CONFLICT(name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(value)
}

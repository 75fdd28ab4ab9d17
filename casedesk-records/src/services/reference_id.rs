//! Reference id generator
//!
//! Draws from the `record_reference` counter with a single atomic upsert;
//! migration v1 seeds that counter from any pre-existing ids.

use casedesk_common::db::REFERENCE_SEQUENCE;
use casedesk_common::reference::format_reference_id;
use casedesk_common::Result;
use sqlx::SqliteConnection;

use crate::db::sequences;

/// Next `REF-nnnnnnn` id
pub async fn next_reference_id(conn: &mut SqliteConnection) -> Result<String> {
    let value = sequences::next_value(conn, REFERENCE_SEQUENCE).await?;
    Ok(format_reference_id(value))
}

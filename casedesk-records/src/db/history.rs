//! Append-only collector assignment history

use casedesk_common::{time, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{encode_uuid_opt, push_id_list, ID_CHUNK};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    pub record_id: String,
    pub from_collector: Option<String>,
    pub to_collector: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: String,
}

pub async fn append_history(
    conn: &mut SqliteConnection,
    record_id: Uuid,
    from_collector: Option<Uuid>,
    to_collector: Option<Uuid>,
    assigned_by: Option<Uuid>,
    assigned_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assignment_history (record_id, from_collector, to_collector, assigned_by, assigned_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record_id.to_string())
    .bind(encode_uuid_opt(from_collector))
    .bind(encode_uuid_opt(to_collector))
    .bind(encode_uuid_opt(assigned_by))
    .bind(time::to_db(assigned_at))
    .execute(conn)
    .await?;

    Ok(())
}

/// History rows of the given records in append order
pub(crate) async fn fetch_history_rows(
    conn: &mut SqliteConnection,
    record_ids: &[Uuid],
) -> Result<Vec<HistoryRow>> {
    let mut rows = Vec::new();
    for chunk in record_ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT record_id, from_collector, to_collector, assigned_by, assigned_at \
             FROM assignment_history WHERE record_id IN ",
        );
        push_id_list(&mut builder, chunk);
        builder.push(" ORDER BY id ASC");

        let mut batch = builder
            .build_query_as::<HistoryRow>()
            .fetch_all(&mut *conn)
            .await?;
        rows.append(&mut batch);
    }
    Ok(rows)
}

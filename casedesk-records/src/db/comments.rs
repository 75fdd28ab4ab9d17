//! Record timeline storage
//!
//! Comments form an ordered child list of their record: ascending `position`
//! is list order. New comments take `MIN(position) - 1` so a prepend never
//! rewrites existing rows.

use casedesk_common::{time, Result, UserRef};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    decode_date_opt, decode_enum, decode_ts, decode_ts_opt, decode_uuid, decode_uuid_opt,
    encode_date_opt, encode_uuid_opt, push_id_list, ID_CHUNK,
};
use crate::models::{CheckCopy, Comment, SourceRecordSnapshot};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub id: String,
    pub record_id: String,
    pub text: String,
    pub status: String,
    pub author: String,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub offer_amount: Option<f64>,
    pub check_number: Option<String>,
    pub check_date: Option<String>,
    pub check_amount: Option<f64>,
    pub check_copy: Option<String>,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub is_from_merged_record: bool,
    pub source_record_id: Option<String>,
    pub source_comment_id: Option<String>,
    pub source_record_snapshot: Option<String>,
    pub merged_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CommentRow {
    pub fn author_id(&self) -> Result<Uuid> {
        decode_uuid(&self.author, "comment author")
    }

    pub fn into_comment(self, users: &HashMap<Uuid, UserRef>) -> Result<Comment> {
        let author_id = self.author_id()?;
        let check_copy: Option<CheckCopy> = self
            .check_copy
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let snapshot: Option<SourceRecordSnapshot> = self
            .source_record_snapshot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Comment {
            id: decode_uuid(&self.id, "comment id")?,
            text: self.text,
            status: decode_enum(&self.status, "comment status")?,
            author: users
                .get(&author_id)
                .cloned()
                .unwrap_or_else(|| UserRef::bare(author_id)),
            scheduled_date: decode_date_opt(self.scheduled_date.as_deref(), "scheduled_date")?,
            scheduled_time: self.scheduled_time,
            offer_amount: self.offer_amount,
            check_number: self.check_number,
            check_date: decode_date_opt(self.check_date.as_deref(), "check_date")?,
            check_amount: self.check_amount,
            check_copy,
            is_completed: self.is_completed,
            completed_at: decode_ts_opt(self.completed_at.as_deref())?,
            is_from_merged_record: self.is_from_merged_record,
            source_record_id: decode_uuid_opt(self.source_record_id.as_deref(), "source_record_id")?,
            source_comment_id: decode_uuid_opt(
                self.source_comment_id.as_deref(),
                "source_comment_id",
            )?,
            source_record_snapshot: snapshot,
            merged_at: decode_ts_opt(self.merged_at.as_deref())?,
            created_at: decode_ts(&self.created_at)?,
            updated_at: decode_ts(&self.updated_at)?,
        })
    }
}

/// Comment rows of the given records, each record's rows in list order
pub(crate) async fn fetch_comment_rows(
    conn: &mut SqliteConnection,
    record_ids: &[Uuid],
) -> Result<Vec<CommentRow>> {
    let mut rows = Vec::new();
    for chunk in record_ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, record_id, text, status, author, scheduled_date, scheduled_time, \
             offer_amount, check_number, check_date, check_amount, check_copy, is_completed, \
             completed_at, is_from_merged_record, source_record_id, source_comment_id, \
             source_record_snapshot, merged_at, created_at, updated_at \
             FROM record_comments WHERE record_id IN ",
        );
        push_id_list(&mut builder, chunk);
        builder.push(" ORDER BY record_id, position ASC");

        let mut batch = builder
            .build_query_as::<CommentRow>()
            .fetch_all(&mut *conn)
            .await?;
        rows.append(&mut batch);
    }
    Ok(rows)
}

/// Close every open follow-up on a record
pub async fn complete_open_comments(
    conn: &mut SqliteConnection,
    record_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64> {
    let stamp = time::to_db(now);
    let result = sqlx::query(
        r#"
        UPDATE record_comments
        SET is_completed = 1, completed_at = ?, updated_at = ?
        WHERE record_id = ? AND is_completed = 0 AND scheduled_date IS NOT NULL
        "#,
    )
    .bind(&stamp)
    .bind(&stamp)
    .bind(record_id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Position that places a new comment in front of the list
pub async fn front_position(conn: &mut SqliteConnection, record_id: Uuid) -> Result<i64> {
    let min: Option<i64> =
        sqlx::query_scalar("SELECT MIN(position) FROM record_comments WHERE record_id = ?")
            .bind(record_id.to_string())
            .fetch_one(conn)
            .await?;

    Ok(min.map(|p| p - 1).unwrap_or(0))
}

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    record_id: Uuid,
    position: i64,
    comment: &Comment,
) -> Result<()> {
    let check_copy = comment
        .check_copy
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let snapshot = comment
        .source_record_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO record_comments (
            id, record_id, position, text, status, author, scheduled_date, scheduled_time,
            offer_amount, check_number, check_date, check_amount, check_copy, is_completed,
            completed_at, is_from_merged_record, source_record_id, source_comment_id,
            source_record_snapshot, merged_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.id.to_string())
    .bind(record_id.to_string())
    .bind(position)
    .bind(&comment.text)
    .bind(comment.status.as_str())
    .bind(comment.author.id.to_string())
    .bind(encode_date_opt(comment.scheduled_date))
    .bind(&comment.scheduled_time)
    .bind(comment.offer_amount)
    .bind(&comment.check_number)
    .bind(encode_date_opt(comment.check_date))
    .bind(comment.check_amount)
    .bind(check_copy)
    .bind(comment.is_completed)
    .bind(comment.completed_at.map(time::to_db))
    .bind(comment.is_from_merged_record)
    .bind(encode_uuid_opt(comment.source_record_id))
    .bind(encode_uuid_opt(comment.source_comment_id))
    .bind(snapshot)
    .bind(comment.merged_at.map(time::to_db))
    .bind(time::to_db(comment.created_at))
    .bind(time::to_db(comment.updated_at))
    .execute(conn)
    .await?;

    Ok(())
}

/// Set the completion flag of one comment. Returns rows affected (0 = no such comment).
pub async fn set_completion(
    conn: &mut SqliteConnection,
    record_id: Uuid,
    comment_id: Uuid,
    is_completed: bool,
    now: DateTime<Utc>,
) -> Result<u64> {
    let stamp = time::to_db(now);
    let completed_at = is_completed.then(|| stamp.clone());

    let result = sqlx::query(
        r#"
        UPDATE record_comments
        SET is_completed = ?, completed_at = ?, updated_at = ?
        WHERE id = ? AND record_id = ?
        "#,
    )
    .bind(is_completed)
    .bind(completed_at)
    .bind(&stamp)
    .bind(comment_id.to_string())
    .bind(record_id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Rewrite positions so list order is `created_at` ascending
pub async fn renumber_chronologically(conn: &mut SqliteConnection, record_id: Uuid) -> Result<()> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM record_comments WHERE record_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(record_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE record_comments SET position = ? WHERE id = ?")
            .bind(position as i64)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

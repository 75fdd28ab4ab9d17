//! Record table access and hydration
//!
//! Engines select record ids with their own filters and call
//! [`load_records`] to get fully populated [`Record`]s: comments in list
//! order, assignment history, and every user reference resolved with one
//! directory lookup.

use casedesk_common::db::find_user_refs;
use casedesk_common::{time, Result, UserRef};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::comments::{fetch_comment_rows, CommentRow};
use super::history::{fetch_history_rows, HistoryRow};
use super::{
    decode_date_opt, decode_enum, decode_enum_opt, decode_ts, decode_ts_opt, decode_uuid,
    decode_uuid_opt, encode_date_opt, encode_uuid_opt, push_id_list, ID_CHUNK,
};
use crate::models::{AssignmentHistoryEntry, MultiEntry, Record, RecordFields};

/// A record is in a redeemer's WFP queue while its top comment is an
/// incomplete `wfp` item. Usable in any query that has `records` in scope.
pub const WFP_QUEUE_CONDITION: &str = "EXISTS (\
    SELECT 1 FROM record_comments tc \
    WHERE tc.record_id = records.id AND tc.status = 'wfp' AND tc.is_completed = 0 \
    AND tc.position = (SELECT MIN(p.position) FROM record_comments p WHERE p.record_id = records.id))";

const RECORD_COLUMNS: &str = "id, reference_id, provider, pt_name, claim_no, adj_number, doi, \
    bill, paid, outstanding, ledger, hcf, invoice, signin_sheet, lien_status, case_status, \
    hearing_date, hearing_time, details, assigned_collector, assigned_at, assigned_by, \
    assigned_payment_redeemer, payment_assigned_at, payment_assigned_by, record_created_at, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub reference_id: String,
    pub provider: String,
    pub pt_name: String,
    pub claim_no: String,
    pub adj_number: String,
    pub doi: String,
    pub bill: Option<f64>,
    pub paid: Option<f64>,
    pub outstanding: Option<f64>,
    pub ledger: String,
    pub hcf: String,
    pub invoice: String,
    pub signin_sheet: String,
    pub lien_status: Option<String>,
    pub case_status: Option<String>,
    pub hearing_date: Option<String>,
    pub hearing_time: Option<String>,
    pub details: String,
    pub assigned_collector: Option<String>,
    pub assigned_at: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_payment_redeemer: Option<String>,
    pub payment_assigned_at: Option<String>,
    pub payment_assigned_by: Option<String>,
    pub record_created_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl RecordRow {
    fn user_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for (value, column) in [
            (&self.assigned_collector, "assigned_collector"),
            (&self.assigned_by, "assigned_by"),
            (&self.assigned_payment_redeemer, "assigned_payment_redeemer"),
            (&self.payment_assigned_by, "payment_assigned_by"),
        ] {
            if let Some(id) = decode_uuid_opt(value.as_deref(), column)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn fields(&self) -> Result<RecordFields> {
        Ok(RecordFields {
            provider: self.provider.clone(),
            pt_name: self.pt_name.clone(),
            claim_no: serde_json::from_str(&self.claim_no)?,
            adj_number: serde_json::from_str(&self.adj_number)?,
            doi: serde_json::from_str(&self.doi)?,
            bill: self.bill,
            paid: self.paid,
            outstanding: self.outstanding,
            ledger: decode_enum(&self.ledger, "ledger")?,
            hcf: decode_enum(&self.hcf, "hcf")?,
            invoice: decode_enum(&self.invoice, "invoice")?,
            signin_sheet: decode_enum(&self.signin_sheet, "signin_sheet")?,
            lien_status: decode_enum_opt(self.lien_status.as_deref(), "lien_status")?,
            case_status: decode_enum_opt(self.case_status.as_deref(), "case_status")?,
            hearing_date: decode_date_opt(self.hearing_date.as_deref(), "hearing_date")?,
            hearing_time: decode_enum_opt(self.hearing_time.as_deref(), "hearing_time")?,
            details: serde_json::from_str(&self.details)?,
        })
    }
}

/// Values for a new record row
#[derive(Debug)]
pub struct InsertRecord<'a> {
    pub id: Uuid,
    pub reference_id: &'a str,
    pub fields: &'a RecordFields,
    pub assigned_collector: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_record(conn: &mut SqliteConnection, record: &InsertRecord<'_>) -> Result<()> {
    let fields = record.fields;
    let stamp = time::to_db(record.created_at);
    let assigned_at = record.assigned_collector.map(|_| stamp.clone());

    sqlx::query(
        r#"
        INSERT INTO records (
            id, reference_id, provider, pt_name, claim_no, adj_number, doi,
            bill, paid, outstanding, ledger, hcf, invoice, signin_sheet,
            lien_status, case_status, hearing_date, hearing_time, details,
            assigned_collector, assigned_at, assigned_by,
            record_created_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.reference_id)
    .bind(&fields.provider)
    .bind(&fields.pt_name)
    .bind(serde_json::to_string(&fields.claim_no)?)
    .bind(serde_json::to_string(&fields.adj_number)?)
    .bind(serde_json::to_string(&fields.doi)?)
    .bind(fields.bill)
    .bind(fields.paid)
    .bind(fields.outstanding)
    .bind(fields.ledger.as_str())
    .bind(fields.hcf.as_str())
    .bind(fields.invoice.as_str())
    .bind(fields.signin_sheet.as_str())
    .bind(fields.lien_status.map(|s| s.as_str()))
    .bind(fields.case_status.map(|s| s.as_str()))
    .bind(encode_date_opt(fields.hearing_date))
    .bind(fields.hearing_time.map(|t| t.as_str()))
    .bind(serde_json::to_string(&fields.details)?)
    .bind(encode_uuid_opt(record.assigned_collector))
    .bind(assigned_at)
    .bind(encode_uuid_opt(record.assigned_by))
    .bind(&stamp)
    .bind(&stamp)
    .bind(&stamp)
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrite every writable field column
pub async fn update_fields(
    conn: &mut SqliteConnection,
    id: Uuid,
    fields: &RecordFields,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE records SET
            provider = ?, pt_name = ?, claim_no = ?, adj_number = ?, doi = ?,
            bill = ?, paid = ?, outstanding = ?, ledger = ?, hcf = ?, invoice = ?,
            signin_sheet = ?, lien_status = ?, case_status = ?, hearing_date = ?,
            hearing_time = ?, details = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.provider)
    .bind(&fields.pt_name)
    .bind(serde_json::to_string(&fields.claim_no)?)
    .bind(serde_json::to_string(&fields.adj_number)?)
    .bind(serde_json::to_string(&fields.doi)?)
    .bind(fields.bill)
    .bind(fields.paid)
    .bind(fields.outstanding)
    .bind(fields.ledger.as_str())
    .bind(fields.hcf.as_str())
    .bind(fields.invoice.as_str())
    .bind(fields.signin_sheet.as_str())
    .bind(fields.lien_status.map(|s| s.as_str()))
    .bind(fields.case_status.map(|s| s.as_str()))
    .bind(encode_date_opt(fields.hearing_date))
    .bind(fields.hearing_time.map(|t| t.as_str()))
    .bind(serde_json::to_string(&fields.details)?)
    .bind(time::to_db(now))
    .bind(id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn record_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM records WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Current collector of each existing record among `ids`
pub async fn current_collectors(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Option<Uuid>>> {
    let mut collectors = HashMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, assigned_collector FROM records WHERE id IN ");
        push_id_list(&mut builder, chunk);

        let rows: Vec<(String, Option<String>)> =
            builder.build_query_as().fetch_all(&mut *conn).await?;
        for (id, collector) in rows {
            collectors.insert(
                decode_uuid(&id, "record id")?,
                decode_uuid_opt(collector.as_deref(), "assigned_collector")?,
            );
        }
    }
    Ok(collectors)
}

/// Point the record at a collector (or none) and stamp the assignment
pub async fn set_collector(
    conn: &mut SqliteConnection,
    id: Uuid,
    collector: Option<Uuid>,
    assigned_by: Option<Uuid>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let stamp = time::to_db(at);
    let result = sqlx::query(
        r#"
        UPDATE records
        SET assigned_collector = ?, assigned_at = ?, assigned_by = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(encode_uuid_opt(collector))
    .bind(&stamp)
    .bind(encode_uuid_opt(assigned_by))
    .bind(&stamp)
    .bind(id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Set the payment redeemer. `None` clears the redeemer and its stamps.
pub async fn set_payment_redeemer(
    conn: &mut SqliteConnection,
    id: Uuid,
    redeemer: Option<(Uuid, Uuid)>,
    at: DateTime<Utc>,
) -> Result<()> {
    let stamp = time::to_db(at);
    let (redeemer_id, assigned_by, assigned_at) = match redeemer {
        Some((redeemer_id, by)) => (Some(redeemer_id.to_string()), Some(by.to_string()), Some(stamp.clone())),
        None => (None, None, None),
    };

    sqlx::query(
        r#"
        UPDATE records
        SET assigned_payment_redeemer = ?, payment_assigned_by = ?, payment_assigned_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(redeemer_id)
    .bind(assigned_by)
    .bind(assigned_at)
    .bind(&stamp)
    .bind(id.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn touch(conn: &mut SqliteConnection, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE records SET updated_at = ? WHERE id = ?")
        .bind(time::to_db(now))
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete records; comments and history go with them
pub async fn delete_records(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM records WHERE id IN ");
        push_id_list(&mut builder, chunk);
        deleted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}

/// Number of records in a redeemer's WFP queue
pub async fn count_wfp_queue(conn: &mut SqliteConnection, redeemer: Uuid) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM records WHERE assigned_payment_redeemer = ? AND {}",
        WFP_QUEUE_CONDITION
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(redeemer.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Run an id-selecting query built by an engine
pub(crate) async fn fetch_ids(
    conn: &mut SqliteConnection,
    builder: &mut QueryBuilder<'_, Sqlite>,
) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = builder
        .build_query_scalar()
        .fetch_all(&mut *conn)
        .await?;
    ids.iter().map(|id| decode_uuid(id, "record id")).collect()
}

/// The columns duplicate detection groups on
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateKeys {
    pub id: Uuid,
    pub provider: String,
    pub pt_name: String,
    pub adj_number: Vec<MultiEntry>,
}

/// Detection keys of every record, oldest first, without hydrating timelines
pub async fn duplicate_keys(conn: &mut SqliteConnection) -> Result<Vec<DuplicateKeys>> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT id, provider, pt_name, adj_number FROM records ORDER BY created_at ASC, rowid ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(id, provider, pt_name, adj_number)| {
            Ok(DuplicateKeys {
                id: decode_uuid(&id, "record id")?,
                provider,
                pt_name,
                adj_number: serde_json::from_str(&adj_number)?,
            })
        })
        .collect()
}

pub async fn load_record(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Record>> {
    Ok(load_records(conn, &[id]).await?.into_iter().next())
}

/// Hydrate records, returned in the order of `ids`. Missing ids are skipped.
pub async fn load_records(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<Vec<Record>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows: Vec<RecordRow> = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM records WHERE id IN ",
            RECORD_COLUMNS
        ));
        push_id_list(&mut builder, chunk);
        let mut batch = builder
            .build_query_as::<RecordRow>()
            .fetch_all(&mut *conn)
            .await?;
        rows.append(&mut batch);
    }

    let comment_rows = fetch_comment_rows(conn, ids).await?;
    let history_rows = fetch_history_rows(conn, ids).await?;

    let mut user_ids: HashSet<Uuid> = HashSet::new();
    for row in &rows {
        user_ids.extend(row.user_ids()?);
    }
    for row in &comment_rows {
        user_ids.insert(row.author_id()?);
    }
    for row in &history_rows {
        for value in [&row.from_collector, &row.to_collector, &row.assigned_by] {
            if let Some(id) = decode_uuid_opt(value.as_deref(), "assignment_history")? {
                user_ids.insert(id);
            }
        }
    }
    let user_ids: Vec<Uuid> = user_ids.into_iter().collect();
    let users = find_user_refs(&mut *conn, &user_ids).await?;

    let mut comments_by_record: HashMap<String, Vec<CommentRow>> = HashMap::new();
    for row in comment_rows {
        comments_by_record
            .entry(row.record_id.clone())
            .or_default()
            .push(row);
    }
    let mut history_by_record: HashMap<String, Vec<HistoryRow>> = HashMap::new();
    for row in history_rows {
        history_by_record
            .entry(row.record_id.clone())
            .or_default()
            .push(row);
    }

    let mut by_id: HashMap<Uuid, Record> = HashMap::with_capacity(rows.len());
    for row in rows {
        let comments = comments_by_record
            .remove(&row.id)
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.into_comment(&users))
            .collect::<Result<Vec<_>>>()?;
        let history = history_by_record
            .remove(&row.id)
            .unwrap_or_default()
            .into_iter()
            .map(|h| history_entry(h, &users))
            .collect::<Result<Vec<_>>>()?;

        let record = Record {
            id: decode_uuid(&row.id, "record id")?,
            reference_id: row.reference_id.clone(),
            fields: row.fields()?,
            comments,
            assigned_collector: resolve(row.assigned_collector.as_deref(), &users)?,
            assigned_at: decode_ts_opt(row.assigned_at.as_deref())?,
            assigned_by: resolve(row.assigned_by.as_deref(), &users)?,
            assignment_history: history,
            assigned_payment_redeemer: resolve(row.assigned_payment_redeemer.as_deref(), &users)?,
            payment_assigned_at: decode_ts_opt(row.payment_assigned_at.as_deref())?,
            payment_assigned_by: resolve(row.payment_assigned_by.as_deref(), &users)?,
            record_created_at: decode_ts(&row.record_created_at)?,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        };
        by_id.insert(record.id, record);
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

fn resolve(value: Option<&str>, users: &HashMap<Uuid, UserRef>) -> Result<Option<UserRef>> {
    Ok(decode_uuid_opt(value, "user reference")?
        .map(|id| users.get(&id).cloned().unwrap_or_else(|| UserRef::bare(id))))
}

fn history_entry(row: HistoryRow, users: &HashMap<Uuid, UserRef>) -> Result<AssignmentHistoryEntry> {
    Ok(AssignmentHistoryEntry {
        from_collector: resolve(row.from_collector.as_deref(), users)?,
        to_collector: resolve(row.to_collector.as_deref(), users)?,
        assigned_by: resolve(row.assigned_by.as_deref(), users)?,
        assigned_at: decode_ts(&row.assigned_at)?,
    })
}

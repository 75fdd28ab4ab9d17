//! Collector assignment engine
//!
//! Every assignment reads the current collector first so the appended
//! history entry carries the right `from` side, then sets the new collector
//! and appends history in one transaction.

use casedesk_common::db::get_user;
use casedesk_common::{time, Actor, Error, Result, Role};
use futures::future::try_join_all;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{parse_id, parse_ids};
use crate::db::{begin_write, history, records};
use crate::models::{ReassignReport, Record};

/// Sentinel accepted in place of a collector id
pub const UNASSIGNED: &str = "unassigned";

/// Resolved target of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorTarget {
    Unassigned,
    Collector(Uuid),
}

impl CollectorTarget {
    pub fn collector_id(&self) -> Option<Uuid> {
        match self {
            CollectorTarget::Unassigned => None,
            CollectorTarget::Collector(id) => Some(*id),
        }
    }
}

/// Parse the target and check it names an existing Collector
pub(crate) async fn resolve_collector(
    conn: &mut SqliteConnection,
    value: &str,
) -> Result<CollectorTarget> {
    if value.trim().eq_ignore_ascii_case(UNASSIGNED) {
        return Ok(CollectorTarget::Unassigned);
    }

    let id = parse_id(value, "collector")?;
    let user = get_user(&mut *conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Collector not found: {}", id)))?;

    if user.role != Role::Collector {
        return Err(Error::InvalidArgument(format!(
            "User {} is a {}, not a Collector",
            user.username, user.role
        )));
    }

    Ok(CollectorTarget::Collector(id))
}

#[derive(Clone)]
pub struct AssignmentEngine {
    db: SqlitePool,
}

impl AssignmentEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Assign one record to a collector (or unassign it)
    pub async fn assign_collector(
        &self,
        record_id: &str,
        collector: &str,
        actor: &Actor,
    ) -> Result<Record> {
        let record_id = parse_id(record_id, "record")?;
        let target = resolve_collector(&mut *self.db.acquire().await?, collector).await?;

        let mut tx = begin_write(&self.db).await?;
        let current = records::current_collectors(&mut tx, &[record_id]).await?;
        let from = current
            .get(&record_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))?;

        apply_assignment(&mut tx, record_id, from, target, actor.user_id).await?;

        let record = records::load_record(&mut tx, record_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))?;
        tx.commit().await?;

        info!(
            record_id = %record_id,
            from = ?from,
            to = ?target.collector_id(),
            actor = %actor.user_id,
            "Assigned collector"
        );

        Ok(record)
    }

    /// Bulk reassignment
    ///
    /// Every id is validated before anything is written. The per-record
    /// writes are independent transactions run concurrently; ids that do not
    /// name an existing record are skipped.
    pub async fn reassign_many<S: AsRef<str>>(
        &self,
        record_ids: &[S],
        collector: &str,
        actor: &Actor,
    ) -> Result<ReassignReport> {
        let ids = parse_ids(record_ids, "record")?;
        let target = resolve_collector(&mut *self.db.acquire().await?, collector).await?;

        let current = records::current_collectors(&mut *self.db.acquire().await?, &ids).await?;
        if current.is_empty() {
            debug!(requested = ids.len(), "No records matched reassignment");
            return Ok(ReassignReport { modified_count: 0 });
        }

        let writes = current.into_iter().map(|(record_id, from)| {
            let db = self.db.clone();
            let assigned_by = actor.user_id;
            async move {
                let mut tx = begin_write(&db).await?;
                apply_assignment(&mut tx, record_id, from, target, assigned_by).await?;
                tx.commit().await?;
                Ok::<u64, Error>(1)
            }
        });
        let modified: u64 = try_join_all(writes).await?.into_iter().sum();

        info!(
            modified,
            to = ?target.collector_id(),
            actor = %actor.user_id,
            "Reassigned records"
        );

        Ok(ReassignReport {
            modified_count: modified as usize,
        })
    }
}

async fn apply_assignment(
    conn: &mut SqliteConnection,
    record_id: Uuid,
    from: Option<Uuid>,
    target: CollectorTarget,
    assigned_by: Uuid,
) -> Result<()> {
    let now = time::now();
    records::set_collector(conn, record_id, target.collector_id(), Some(assigned_by), now).await?;
    history::append_history(
        conn,
        record_id,
        from,
        target.collector_id(),
        Some(assigned_by),
        now,
    )
    .await
}

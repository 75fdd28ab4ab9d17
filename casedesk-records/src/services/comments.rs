//! Comment timeline engine
//!
//! Adding a comment is one transaction: close every open follow-up, pick a
//! payment redeemer when the record enters the WFP queue, prepend the new
//! comment, and clear the redeemer when the record leaves the queue.
//!
//! Redeemer selection is least-loaded at the moment of the read. Two
//! concurrent `wfp` comments may both see the same counts, so balance is
//! best-effort under concurrency.

use casedesk_common::db::list_users_by_role;
use casedesk_common::{time, Actor, Error, Result, Role, UserRef};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::parse_id;
use super::visibility::redact_for_role;
use crate::db::{begin_write, comments, records};
use crate::models::{calendar_date_opt, CheckCopy, Comment, CommentStatus, Record};

/// Largest decoded check copy accepted
pub const MAX_CHECK_COPY_BYTES: usize = 5 * 1024 * 1024;

/// Input of [`CommentEngine::add_comment`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub text: String,
    pub status: CommentStatus,
    #[serde(default, deserialize_with = "calendar_date_opt")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub offer_amount: Option<f64>,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default, deserialize_with = "calendar_date_opt")]
    pub check_date: Option<NaiveDate>,
    #[serde(default)]
    pub check_amount: Option<f64>,
    #[serde(default)]
    pub check_copy: Option<CheckCopy>,
}

impl NewComment {
    pub fn new(text: impl Into<String>, status: CommentStatus) -> Self {
        Self {
            text: text.into(),
            status,
            scheduled_date: None,
            scheduled_time: None,
            offer_amount: None,
            check_number: None,
            check_date: None,
            check_amount: None,
            check_copy: None,
        }
    }

    pub fn scheduled(mut self, date: NaiveDate, time: Option<&str>) -> Self {
        self.scheduled_date = Some(date);
        self.scheduled_time = time.map(str::to_string);
        self
    }
}

/// Input of [`CommentEngine::update_comment`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    pub is_completed: Option<bool>,
}

impl CommentPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            is_completed: Some(value),
        }
    }
}

/// Status-transition role gate
pub fn check_status_permission(status: CommentStatus, role: Role) -> Result<()> {
    match status {
        CommentStatus::Closed if !role.is_admin() => Err(Error::Forbidden(
            "Only administrators or super admins can use this status".to_string(),
        )),
        CommentStatus::PaymentReceived if role != Role::PaymentRedeemer => Err(Error::Forbidden(
            "Only a Payment Redeemer can add 'Payment Received' comments".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Check details required on a `payment_received` comment
pub fn validate_payment(input: &NewComment) -> Result<()> {
    if input.status != CommentStatus::PaymentReceived {
        return Ok(());
    }

    let check_number = input.check_number.as_deref().map(str::trim).unwrap_or("");
    if check_number.is_empty() {
        return Err(Error::InvalidArgument("Check number is required".to_string()));
    }
    if input.check_date.is_none() {
        return Err(Error::InvalidArgument("Check date is required".to_string()));
    }
    match input.check_amount {
        Some(amount) if amount > 0.0 => {}
        _ => {
            return Err(Error::InvalidArgument(
                "Check amount must be greater than 0".to_string(),
            ))
        }
    }

    let copy = input
        .check_copy
        .as_ref()
        .filter(|c| !c.base64.trim().is_empty())
        .ok_or_else(|| Error::InvalidArgument("A copy of the check is required".to_string()))?;

    let approx_bytes = copy.base64.len() * 3 / 4;
    if approx_bytes > MAX_CHECK_COPY_BYTES {
        return Err(Error::InvalidArgument(
            "Check copy file too large (max 5MB)".to_string(),
        ));
    }

    Ok(())
}

/// Normalize the time of day to `HH:MM`, rejecting unreadable values
fn normalize_scheduled_time(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(time::parse_wall_time(raw)?.format("%H:%M").to_string())),
    }
}

/// Redeemer with the fewest records in their WFP queue; ties go to the
/// earlier-created user
pub(crate) async fn pick_payment_redeemer(conn: &mut SqliteConnection) -> Result<Option<Uuid>> {
    let redeemers = list_users_by_role(&mut *conn, Role::PaymentRedeemer).await?;

    let mut best: Option<(Uuid, i64)> = None;
    for redeemer in &redeemers {
        let load = records::count_wfp_queue(conn, redeemer.id).await?;
        debug!(redeemer = %redeemer.id, load, "WFP queue load");
        if best.map(|(_, best_load)| load < best_load).unwrap_or(true) {
            best = Some((redeemer.id, load));
        }
    }

    Ok(best.map(|(id, _)| id))
}

#[derive(Clone)]
pub struct CommentEngine {
    db: SqlitePool,
}

impl CommentEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Prepend a comment to a record's timeline
    pub async fn add_comment(
        &self,
        record_id: &str,
        input: NewComment,
        actor: &Actor,
    ) -> Result<Record> {
        let record_id = parse_id(record_id, "record")?;
        check_status_permission(input.status, actor.role)?;
        validate_payment(&input)?;
        let scheduled_time = normalize_scheduled_time(input.scheduled_time.as_deref())?;

        let now = time::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            text: input.text.trim().to_string(),
            status: input.status,
            author: UserRef::bare(actor.user_id),
            scheduled_date: input.scheduled_date,
            scheduled_time,
            offer_amount: input.offer_amount,
            check_number: input.check_number.map(|n| n.trim().to_string()),
            check_date: input.check_date,
            check_amount: input.check_amount,
            check_copy: input.check_copy,
            is_completed: false,
            completed_at: None,
            is_from_merged_record: false,
            source_record_id: None,
            source_comment_id: None,
            source_record_snapshot: None,
            merged_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = begin_write(&self.db).await?;
        if !records::record_exists(&mut tx, record_id).await? {
            return Err(Error::NotFound(format!("Record not found: {}", record_id)));
        }

        let completed = comments::complete_open_comments(&mut tx, record_id, now).await?;

        let redeemer = if comment.status == CommentStatus::Wfp {
            let picked = pick_payment_redeemer(&mut tx).await?;
            if picked.is_none() {
                warn!(record_id = %record_id, "No payment redeemer available for WFP hand-off");
            }
            picked
        } else {
            None
        };

        let position = comments::front_position(&mut tx, record_id).await?;
        comments::insert_comment(&mut tx, record_id, position, &comment).await?;

        match comment.status {
            CommentStatus::Wfp => {
                if let Some(redeemer) = redeemer {
                    records::set_payment_redeemer(
                        &mut tx,
                        record_id,
                        Some((redeemer, actor.user_id)),
                        now,
                    )
                    .await?;
                } else {
                    records::touch(&mut tx, record_id, now).await?;
                }
            }
            CommentStatus::PaymentReceived | CommentStatus::Closed => {
                records::set_payment_redeemer(&mut tx, record_id, None, now).await?;
            }
            _ => records::touch(&mut tx, record_id, now).await?,
        }

        let mut record = records::load_record(&mut tx, record_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))?;
        tx.commit().await?;

        info!(
            record_id = %record_id,
            comment_id = %comment.id,
            status = %comment.status,
            auto_completed = completed,
            redeemer = ?redeemer,
            actor = %actor.user_id,
            "Added comment"
        );

        redact_for_role(&mut record, actor.role);
        Ok(record)
    }

    /// Set or clear the completion flag of one comment
    pub async fn update_comment(
        &self,
        record_id: &str,
        comment_id: &str,
        patch: CommentPatch,
        actor: &Actor,
    ) -> Result<Record> {
        let record_id = parse_id(record_id, "record")?;
        let comment_id = parse_id(comment_id, "comment")?;
        let is_completed = patch
            .is_completed
            .ok_or_else(|| Error::InvalidArgument("isCompleted is required".to_string()))?;

        let now = time::now();
        let mut tx = begin_write(&self.db).await?;
        let affected =
            comments::set_completion(&mut tx, record_id, comment_id, is_completed, now).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!(
                "Comment {} not found on record {}",
                comment_id, record_id
            )));
        }
        records::touch(&mut tx, record_id, now).await?;

        let mut record = records::load_record(&mut tx, record_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))?;
        tx.commit().await?;

        info!(
            record_id = %record_id,
            comment_id = %comment_id,
            is_completed,
            actor = %actor.user_id,
            "Updated comment"
        );

        redact_for_role(&mut record, actor.role);
        Ok(record)
    }
}

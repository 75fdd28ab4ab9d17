//! Scheduling and notification engine
//!
//! Everything here is computed on demand from the stored timelines. All
//! follow-up instants are Pacific wall-clock readings converted through
//! `casedesk_common::time`, so DST transitions are honoured.

use casedesk_common::time::{business_date_and_time, business_end_of_day, parse_wall_time};
use casedesk_common::{time, Actor, Result, Role};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::visibility::VisibilityPolicy;
use crate::db::records::{self, fetch_ids};
use crate::models::{
    Comment, CommentStatus, HearingEvent, Notification, NotificationKind, OverdueEvent, Record,
    ScheduledEvent,
};

/// Width of the upcoming and active windows
pub const NOTIFICATION_WINDOW_MINUTES: i64 = 60;

/// Grace after a timed follow-up before it counts as overdue
pub const OVERDUE_GRACE_MINUTES: i64 = 15;

/// How long an untouched assignment stays announced
pub const ASSIGNMENT_ALERT_MINUTES: i64 = 60;

const OPEN_ITEM_EXISTS: &str = "EXISTS (SELECT 1 FROM record_comments oc \
    WHERE oc.record_id = records.id AND oc.is_completed = 0 AND oc.scheduled_date IS NOT NULL)";

/// Position of a follow-up instant relative to `now`; `None` when it is
/// further away than the upcoming window
pub fn classify(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<NotificationKind> {
    let window = Duration::minutes(NOTIFICATION_WINDOW_MINUTES);
    if scheduled_at > now {
        (scheduled_at <= now + window).then_some(NotificationKind::Upcoming)
    } else if scheduled_at >= now - window {
        Some(NotificationKind::Active)
    } else {
        Some(NotificationKind::Overdue)
    }
}

/// Which follow-up kinds a role is shown
pub fn follow_up_visible(role: Role, kind: NotificationKind) -> bool {
    match role {
        Role::Admin | Role::SuperAdmin => kind == NotificationKind::Overdue,
        Role::Collector | Role::PaymentRedeemer => kind == NotificationKind::Upcoming,
        _ => false,
    }
}

/// Latest open comment (by creation) whose date falls in the window
pub fn latest_open_in_window(
    record: &Record,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    wfp_only: bool,
) -> Option<&Comment> {
    record
        .comments
        .iter()
        .filter(|c| c.is_open())
        .filter(|c| !wfp_only || c.status == CommentStatus::Wfp)
        .filter(|c| match c.scheduled_date {
            Some(date) => start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e),
            None => false,
        })
        .max_by_key(|c| c.created_at)
}

/// Open timed follow-up with the latest scheduled instant
fn latest_timed_follow_up(record: &Record) -> Option<(&Comment, DateTime<Utc>)> {
    record
        .comments
        .iter()
        .filter(|c| c.is_open() && has_time(c))
        .filter_map(|c| c.scheduled_at().map(|at| (c, at)))
        .max_by_key(|(_, at)| *at)
}

fn has_time(comment: &Comment) -> bool {
    comment
        .scheduled_time
        .as_deref()
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false)
}

/// When an open follow-up becomes overdue: its instant plus the grace
/// window, or the end of its Pacific day when no time is set
pub fn overdue_deadline(comment: &Comment) -> Option<DateTime<Utc>> {
    let date = comment.scheduled_date?;
    let timed = comment
        .scheduled_time
        .as_deref()
        .and_then(|t| parse_wall_time(t).ok());

    Some(match timed {
        Some(time_of_day) => {
            time::business_to_utc(date, time_of_day) + Duration::minutes(OVERDUE_GRACE_MINUTES)
        }
        None => business_end_of_day(date),
    })
}

#[derive(Clone)]
pub struct EventEngine {
    db: SqlitePool,
}

impl EventEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn records_with_open_items(
        &self,
        conn: &mut SqliteConnection,
        policy: &VisibilityPolicy,
    ) -> Result<Vec<Record>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT records.id FROM records WHERE ");
        policy.push_sql(&mut builder);
        builder.push(" AND ").push(OPEN_ITEM_EXISTS);
        builder.push(" ORDER BY records.created_at ASC");

        let ids = fetch_ids(conn, &mut builder).await?;
        debug!(candidates = ids.len(), policy = ?policy, "Scanning open follow-ups");
        records::load_records(conn, &ids).await
    }

    /// Latest open follow-up per visible record, ordered by scheduled instant
    pub async fn scheduled_events(
        &self,
        actor: &Actor,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ScheduledEvent>> {
        let policy = VisibilityPolicy::for_events(actor);
        let wfp_only = actor.role == Role::PaymentRedeemer;

        let mut conn = self.db.acquire().await?;
        let records = self.records_with_open_items(&mut conn, &policy).await?;

        let mut events: Vec<ScheduledEvent> = records
            .iter()
            .filter_map(|record| {
                let comment = latest_open_in_window(record, start, end, wfp_only)?;
                Some(ScheduledEvent {
                    record_id: record.id,
                    comment_id: comment.id,
                    pt_name: record.fields.pt_name.clone(),
                    text: comment.text.clone(),
                    status: comment.status,
                    scheduled_date: comment.scheduled_date?,
                    scheduled_time: comment.scheduled_time.clone(),
                    offer_amount: comment.offer_amount,
                    author: comment.author.clone(),
                    assigned_collector: record.assigned_collector.clone(),
                    created_at: comment.created_at,
                    scheduled_at: comment.scheduled_at()?,
                })
            })
            .collect();

        events.sort_by_key(|e| e.scheduled_at);
        Ok(events)
    }

    pub async fn notifications(&self, actor: &Actor) -> Result<Vec<Notification>> {
        self.notifications_at(actor, time::now()).await
    }

    /// Follow-up and assignment alerts for `actor` as of `now`
    pub async fn notifications_at(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let policy = match actor.role {
            Role::Admin | Role::SuperAdmin => VisibilityPolicy::Everything,
            Role::Collector | Role::PaymentRedeemer => VisibilityPolicy::for_events(actor),
            _ => return Ok(Vec::new()),
        };

        let mut conn = self.db.acquire().await?;
        let records = self.records_with_open_items(&mut conn, &policy).await?;

        let mut notifications = Vec::new();
        for record in &records {
            let Some((comment, scheduled_at)) = latest_timed_follow_up(record) else {
                continue;
            };
            let Some(kind) = classify(scheduled_at, now) else {
                continue;
            };
            if !follow_up_visible(actor.role, kind) {
                continue;
            }
            let Some(scheduled_date) = comment.scheduled_date else {
                continue;
            };

            notifications.push(Notification {
                record_id: record.id,
                comment_id: Some(comment.id),
                pt_name: record.fields.pt_name.clone(),
                text: comment.text.clone(),
                status: comment.status.to_string(),
                scheduled_date,
                scheduled_time: comment.scheduled_time.clone().unwrap_or_default(),
                scheduled_at,
                author: Some(comment.author.clone()),
                assigned_collector: record.assigned_collector.clone(),
                kind,
                is_overdue: kind == NotificationKind::Overdue,
                is_assignment: false,
            });
        }

        if matches!(actor.role, Role::Collector | Role::PaymentRedeemer) {
            let seen: HashSet<Uuid> = notifications.iter().map(|n| n.record_id).collect();
            let alerts = self
                .assignment_alerts(&mut conn, actor, now)
                .await?
                .into_iter()
                .filter(|n| !seen.contains(&n.record_id));
            notifications.extend(alerts);
        }

        notifications.sort_by_key(|n| n.scheduled_at);
        Ok(notifications)
    }

    /// Records handed to the actor within the alert window that they have
    /// not commented on since
    async fn assignment_alerts(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let (owner_column, stamp_column) = match actor.role {
            Role::Collector => ("assigned_collector", "assigned_at"),
            Role::PaymentRedeemer => ("assigned_payment_redeemer", "payment_assigned_at"),
            _ => return Ok(Vec::new()),
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT records.id FROM records WHERE records.");
        builder
            .push(owner_column)
            .push(" = ")
            .push_bind(actor.user_id.to_string())
            .push(" AND records.")
            .push(stamp_column)
            .push(" >= ")
            .push_bind(time::to_db(now - Duration::minutes(ASSIGNMENT_ALERT_MINUTES)));

        let ids = fetch_ids(conn, &mut builder).await?;
        let records = records::load_records(conn, &ids).await?;

        let mut alerts = Vec::new();
        for record in records {
            let assigned_at = match actor.role {
                Role::Collector => record.assigned_at,
                _ => record.payment_assigned_at,
            };
            let Some(assigned_at) = assigned_at else {
                continue;
            };

            let touched = record
                .comments
                .iter()
                .any(|c| c.author.id == actor.user_id && c.created_at > assigned_at);
            if touched {
                continue;
            }

            let (scheduled_date, scheduled_time) = business_date_and_time(assigned_at);
            alerts.push(Notification {
                record_id: record.id,
                comment_id: None,
                text: format!("New record assigned: {}", record.fields.pt_name),
                pt_name: record.fields.pt_name,
                status: "Assigned".to_string(),
                scheduled_date,
                scheduled_time,
                scheduled_at: assigned_at,
                author: None,
                assigned_collector: record.assigned_collector,
                kind: NotificationKind::Assignment,
                is_overdue: false,
                is_assignment: true,
            });
        }

        Ok(alerts)
    }

    pub async fn overdue_events(&self) -> Result<Vec<OverdueEvent>> {
        self.overdue_events_at(time::now()).await
    }

    /// Org-wide sweep of follow-ups past their deadline, earliest first
    pub async fn overdue_events_at(&self, now: DateTime<Utc>) -> Result<Vec<OverdueEvent>> {
        let mut conn = self.db.acquire().await?;
        let records = self
            .records_with_open_items(&mut conn, &VisibilityPolicy::Everything)
            .await?;

        let mut overdue: Vec<OverdueEvent> = records
            .iter()
            .filter_map(|record| {
                let comment = record.latest_open_comment()?;
                let deadline = overdue_deadline(comment)?;
                (now > deadline).then(|| OverdueEvent {
                    record_id: record.id,
                    comment_id: comment.id,
                    pt_name: record.fields.pt_name.clone(),
                    text: comment.text.clone(),
                    status: comment.status,
                    scheduled_date: comment.scheduled_date.unwrap_or_else(|| deadline.date_naive()),
                    scheduled_time: comment.scheduled_time.clone(),
                    author: comment.author.clone(),
                    assigned_collector: record.assigned_collector.clone(),
                    deadline,
                })
            })
            .collect();

        overdue.sort_by_key(|e| e.deadline);
        Ok(overdue)
    }

    /// Records with a hearing date in the window, earliest hearing first
    pub async fn hearing_events(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HearingEvent>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT records.id FROM records WHERE records.hearing_date IS NOT NULL");
        if let Some(start) = start {
            builder
                .push(" AND records.hearing_date >= ")
                .push_bind(start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = end {
            builder
                .push(" AND records.hearing_date <= ")
                .push_bind(end.format("%Y-%m-%d").to_string());
        }
        builder.push(" ORDER BY records.hearing_date ASC, records.created_at ASC");

        let mut conn = self.db.acquire().await?;
        let ids = fetch_ids(&mut conn, &mut builder).await?;
        let records = records::load_records(&mut conn, &ids).await?;

        Ok(records.into_iter().filter_map(hearing_event).collect())
    }
}

fn hearing_event(record: Record) -> Option<HearingEvent> {
    let author = record
        .comments
        .iter()
        .max_by_key(|c| c.created_at)
        .map(|c| c.author.clone());
    let fields = record.fields;
    let details = fields.details;

    Some(HearingEvent {
        record_id: record.id,
        provider: fields.provider,
        pt_name: fields.pt_name,
        adj_number: fields.adj_number,
        case_status: fields.case_status,
        hearing_status: details.hearing_status,
        hearing_date: fields.hearing_date?,
        hearing_time: fields.hearing_time,
        judge_name: details.judge_name,
        court_room_link: details.court_room_link,
        judge_phone: details.judge_phone,
        access_code: details.access_code,
        board_location: details.board_location,
        pmr_status: details.pmr_status,
        dor_filed_by: details.dor_filed_by,
        status_4903_8: details.status_4903_8,
        judge_order_status: details.judge_order_status,
        assigned_collector: record.assigned_collector,
        author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use casedesk_common::UserRef;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn open_comment(date: NaiveDate, time: Option<&str>) -> Comment {
        let now = Utc::now();
        Comment {
            id: Uuid::new_v4(),
            text: "follow up".to_string(),
            status: CommentStatus::Callback,
            author: UserRef::bare(Uuid::new_v4()),
            scheduled_date: Some(date),
            scheduled_time: time.map(str::to_string),
            offer_amount: None,
            check_number: None,
            check_date: None,
            check_amount: None,
            check_copy: None,
            is_completed: false,
            completed_at: None,
            is_from_merged_record: false,
            source_record_id: None,
            source_comment_id: None,
            source_record_snapshot: None,
            merged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_classify_windows() {
        let now = at(12, 0);
        assert_eq!(classify(at(12, 30), now), Some(NotificationKind::Upcoming));
        assert_eq!(classify(at(13, 0), now), Some(NotificationKind::Upcoming));
        assert_eq!(classify(at(13, 1), now), None);
        assert_eq!(classify(at(12, 0), now), Some(NotificationKind::Active));
        assert_eq!(classify(at(11, 0), now), Some(NotificationKind::Active));
        assert_eq!(classify(at(10, 59), now), Some(NotificationKind::Overdue));
    }

    #[test]
    fn test_role_visibility_of_follow_ups() {
        assert!(follow_up_visible(Role::Admin, NotificationKind::Overdue));
        assert!(!follow_up_visible(Role::Admin, NotificationKind::Upcoming));
        assert!(follow_up_visible(Role::Collector, NotificationKind::Upcoming));
        assert!(!follow_up_visible(Role::Collector, NotificationKind::Active));
        assert!(follow_up_visible(Role::PaymentRedeemer, NotificationKind::Upcoming));
        assert!(!follow_up_visible(Role::Verifier, NotificationKind::Overdue));
    }

    #[test]
    fn test_overdue_deadline_timed_and_untimed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        // 09:00 PST = 17:00 UTC, plus 15 minutes grace
        let timed = overdue_deadline(&open_comment(date, Some("09:00"))).unwrap();
        assert_eq!(timed, Utc.with_ymd_and_hms(2024, 1, 15, 17, 15, 0).unwrap());

        // End of the Pacific day: 2024-01-16 08:00 UTC minus 1ms
        let untimed = overdue_deadline(&open_comment(date, None)).unwrap();
        assert_eq!(
            untimed,
            Utc.with_ymd_and_hms(2024, 1, 16, 8, 0, 0).unwrap() - Duration::milliseconds(1)
        );
    }
}

//! Calendar and notification projections computed from record timelines

use casedesk_common::UserRef;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::{CaseStatus, CommentStatus, DorFiledBy, HearingTime, JudgeOrderStatus, YesNo};
use super::record::MultiEntry;

/// Latest open follow-up of one record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEvent {
    pub record_id: Uuid,
    pub comment_id: Uuid,
    pub pt_name: String,
    pub text: String,
    pub status: CommentStatus,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    pub offer_amount: Option<f64>,
    pub author: UserRef,
    pub assigned_collector: Option<UserRef>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

/// Where a follow-up sits relative to "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Due within the next hour
    Upcoming,
    /// Came due within the last hour
    Active,
    /// More than an hour past due
    Overdue,
    /// Freshly assigned work not yet touched
    Assignment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub record_id: Uuid,
    pub comment_id: Option<Uuid>,
    pub pt_name: String,
    pub text: String,
    /// Comment status, or `Assigned` for assignment alerts
    pub status: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub scheduled_at: DateTime<Utc>,
    pub author: Option<UserRef>,
    pub assigned_collector: Option<UserRef>,
    pub kind: NotificationKind,
    pub is_overdue: bool,
    pub is_assignment: bool,
}

/// Follow-up whose grace window has passed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueEvent {
    pub record_id: Uuid,
    pub comment_id: Uuid,
    pub pt_name: String,
    pub text: String,
    pub status: CommentStatus,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    pub author: UserRef,
    pub assigned_collector: Option<UserRef>,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingEvent {
    pub record_id: Uuid,
    pub provider: String,
    pub pt_name: String,
    pub adj_number: Vec<MultiEntry>,
    pub case_status: Option<CaseStatus>,
    pub hearing_status: Option<String>,
    pub hearing_date: NaiveDate,
    pub hearing_time: Option<HearingTime>,
    pub judge_name: Option<String>,
    pub court_room_link: Option<String>,
    pub judge_phone: Option<String>,
    pub access_code: Option<String>,
    pub board_location: Option<String>,
    pub pmr_status: Option<YesNo>,
    pub dor_filed_by: Option<DorFiledBy>,
    #[serde(rename = "status4903_8")]
    pub status_4903_8: Option<YesNo>,
    pub judge_order_status: Option<JudgeOrderStatus>,
    pub assigned_collector: Option<UserRef>,
    /// Author of the newest comment
    pub author: Option<UserRef>,
}

//! Record, comment and assignment-history types

use casedesk_common::time::{parse_calendar_date, scheduled_instant};
use casedesk_common::UserRef;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::enums::{
    blank_as_none, CaseStatus, CommentStatus, DocFlag, DorFiledBy, HearingTime, JudgeOrderStatus,
    LienStatus, YesNo,
};

/// One entry of a repeatable list (claim number, adjuster number, date of injury)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiEntry {
    pub value: String,
}

impl MultiEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Serde helper for optional calendar dates given as `YYYY-MM-DD` or RFC 3339
pub(crate) fn calendar_date_opt<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_calendar_date(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Descriptive fields the engines never filter on, stored as one JSON column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordDetails {
    pub rendering_facility: Option<String>,
    pub tax_id: Option<String>,
    #[serde(deserialize_with = "calendar_date_opt")]
    pub dob: Option<NaiveDate>,
    pub ssn: Option<String>,
    pub employer: Option<String>,
    pub insurance: Option<String>,
    #[serde(deserialize_with = "calendar_date_opt")]
    pub fds: Option<NaiveDate>,
    #[serde(deserialize_with = "calendar_date_opt")]
    pub lds: Option<NaiveDate>,
    #[serde(deserialize_with = "calendar_date_opt")]
    pub sol_date: Option<NaiveDate>,
    pub adjuster: Option<String>,
    pub adjuster_phone: Option<String>,
    pub adjuster_fax: Option<String>,
    pub adjuster_email: Option<String>,
    pub defense_attorney: Option<String>,
    pub defense_attorney_phone: Option<String>,
    pub defense_attorney_fax: Option<String>,
    pub defense_attorney_email: Option<String>,
    pub hearing_status: Option<String>,
    pub judge_name: Option<String>,
    #[serde(alias = "courtRoomlink")]
    pub court_room_link: Option<String>,
    pub judge_phone: Option<String>,
    #[serde(alias = "AccesCode")]
    pub access_code: Option<String>,
    pub board_location: Option<String>,
    #[serde(deserialize_with = "calendar_date_opt")]
    pub case_date: Option<NaiveDate>,
    pub cr_amount: Option<f64>,
    #[serde(deserialize_with = "blank_as_none")]
    pub dor_filed_by: Option<DorFiledBy>,
    #[serde(rename = "status4903_8", deserialize_with = "blank_as_none")]
    pub status_4903_8: Option<YesNo>,
    #[serde(deserialize_with = "blank_as_none")]
    pub pmr_status: Option<YesNo>,
    #[serde(deserialize_with = "blank_as_none")]
    pub judge_order_status: Option<JudgeOrderStatus>,
}

impl RecordDetails {
    /// Overwrite every field that is set in `patch`
    pub fn merge_from(&mut self, patch: RecordDetails) {
        macro_rules! take_set {
            ($($field:ident),+ $(,)?) => {
                $(
                    if patch.$field.is_some() {
                        self.$field = patch.$field;
                    }
                )+
            };
        }

        take_set!(
            rendering_facility,
            tax_id,
            dob,
            ssn,
            employer,
            insurance,
            fds,
            lds,
            sol_date,
            adjuster,
            adjuster_phone,
            adjuster_fax,
            adjuster_email,
            defense_attorney,
            defense_attorney_phone,
            defense_attorney_fax,
            defense_attorney_email,
            hearing_status,
            judge_name,
            court_room_link,
            judge_phone,
            access_code,
            board_location,
            case_date,
            cr_amount,
            dor_filed_by,
            status_4903_8,
            pmr_status,
            judge_order_status,
        );
    }
}

/// Writable fields of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub pt_name: String,
    #[serde(default)]
    pub claim_no: Vec<MultiEntry>,
    #[serde(default)]
    pub adj_number: Vec<MultiEntry>,
    #[serde(default)]
    pub doi: Vec<MultiEntry>,
    pub bill: Option<f64>,
    pub paid: Option<f64>,
    pub outstanding: Option<f64>,
    #[serde(default)]
    pub ledger: DocFlag,
    #[serde(default)]
    pub hcf: DocFlag,
    #[serde(default)]
    pub invoice: DocFlag,
    #[serde(default)]
    pub signin_sheet: DocFlag,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub lien_status: Option<LienStatus>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub case_status: Option<CaseStatus>,
    #[serde(default, deserialize_with = "calendar_date_opt")]
    pub hearing_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub hearing_time: Option<HearingTime>,
    #[serde(flatten)]
    pub details: RecordDetails,
}

impl RecordFields {
    pub fn new(provider: impl Into<String>, pt_name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            pt_name: pt_name.into(),
            ..Default::default()
        }
    }

    /// Adjuster numbers as plain strings, blanks dropped
    pub fn adj_values(&self) -> Vec<String> {
        self.adj_number
            .iter()
            .map(|entry| entry.value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

/// `outstanding = bill - paid` when both are known, else `bill`
pub fn derive_outstanding(bill: Option<f64>, paid: Option<f64>) -> Option<f64> {
    match (bill, paid) {
        (Some(bill), Some(paid)) => Some(bill - paid),
        (Some(bill), None) => Some(bill),
        _ => None,
    }
}

/// Scanned check attached to a `payment_received` comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckCopy {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub base64: String,
}

/// Origin record as it looked when its comments were merged away
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecordSnapshot {
    pub provider: String,
    pub pt_name: String,
    pub adj_numbers: Vec<String>,
    pub record_created_at: DateTime<Utc>,
    pub assigned_collector: Option<UserRef>,
}

/// One timeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub status: CommentStatus,
    pub author: UserRef,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    pub offer_amount: Option<f64>,
    pub check_number: Option<String>,
    pub check_date: Option<NaiveDate>,
    pub check_amount: Option<f64>,
    pub check_copy: Option<CheckCopy>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_from_merged_record: bool,
    pub source_record_id: Option<Uuid>,
    pub source_comment_id: Option<Uuid>,
    pub source_record_snapshot: Option<SourceRecordSnapshot>,
    pub merged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Outstanding follow-up: not completed and scheduled
    pub fn is_open(&self) -> bool {
        !self.is_completed && self.scheduled_date.is_some()
    }

    /// Absolute instant of the follow-up, interpreted in business time
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_date
            .map(|date| scheduled_instant(date, self.scheduled_time.as_deref()))
    }

    /// Key identifying the original comment of a merged copy
    pub fn merge_key(&self) -> Option<(Uuid, Uuid)> {
        match (self.source_record_id, self.source_comment_id) {
            (Some(record), Some(comment)) => Some((record, comment)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentHistoryEntry {
    pub from_collector: Option<UserRef>,
    pub to_collector: Option<UserRef>,
    pub assigned_by: Option<UserRef>,
    pub assigned_at: DateTime<Utc>,
}

/// A case with its timeline and assignment state, user references populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: Uuid,
    pub reference_id: String,
    #[serde(flatten)]
    pub fields: RecordFields,
    /// Newest first, except after a merge (chronological)
    pub comments: Vec<Comment>,
    pub assigned_collector: Option<UserRef>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<UserRef>,
    pub assignment_history: Vec<AssignmentHistoryEntry>,
    pub assigned_payment_redeemer: Option<UserRef>,
    pub payment_assigned_at: Option<DateTime<Utc>>,
    pub payment_assigned_by: Option<UserRef>,
    pub record_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Comment at list position 0
    pub fn top_comment(&self) -> Option<&Comment> {
        self.comments.first()
    }

    /// Open comment with the most recent `created_at`
    pub fn latest_open_comment(&self) -> Option<&Comment> {
        self.comments
            .iter()
            .filter(|c| c.is_open())
            .max_by_key(|c| c.created_at)
    }

    pub fn collector_id(&self) -> Option<Uuid> {
        self.assigned_collector.as_ref().map(|u| u.id)
    }

    pub fn redeemer_id(&self) -> Option<Uuid> {
        self.assigned_payment_redeemer.as_ref().map(|u| u.id)
    }

    pub fn has_comment_by(&self, user_id: Uuid) -> bool {
        self.comments.iter().any(|c| c.author.id == user_id)
    }
}

/// Record plus per-query decoration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListItem {
    #[serde(flatten)]
    pub record: Record,
    /// Newest comment by the pinned collector (history view only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_comment_date: Option<DateTime<Utc>>,
}

/// Partial update. Fields left out stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub provider: Option<String>,
    pub pt_name: Option<String>,
    pub claim_no: Option<Vec<MultiEntry>>,
    pub adj_number: Option<Vec<MultiEntry>>,
    pub doi: Option<Vec<MultiEntry>>,
    pub bill: Option<f64>,
    pub paid: Option<f64>,
    pub outstanding: Option<f64>,
    pub ledger: Option<DocFlag>,
    pub hcf: Option<DocFlag>,
    pub invoice: Option<DocFlag>,
    pub signin_sheet: Option<DocFlag>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub lien_status: Option<LienStatus>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub case_status: Option<CaseStatus>,
    #[serde(default, deserialize_with = "calendar_date_opt")]
    pub hearing_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub hearing_time: Option<HearingTime>,
    #[serde(flatten)]
    pub details: RecordDetails,
}

impl RecordPatch {
    pub fn touches_billing(&self) -> bool {
        self.bill.is_some() || self.paid.is_some()
    }

    /// Apply onto `fields`, recomputing `outstanding` when billing changed
    pub fn apply_to(self, fields: &mut RecordFields) {
        let touches_billing = self.touches_billing();

        if let Some(provider) = self.provider {
            fields.provider = provider;
        }
        if let Some(pt_name) = self.pt_name {
            fields.pt_name = pt_name;
        }
        if let Some(claim_no) = self.claim_no {
            fields.claim_no = claim_no;
        }
        if let Some(adj_number) = self.adj_number {
            fields.adj_number = adj_number;
        }
        if let Some(doi) = self.doi {
            fields.doi = doi;
        }
        if self.bill.is_some() {
            fields.bill = self.bill;
        }
        if self.paid.is_some() {
            fields.paid = self.paid;
        }
        if self.outstanding.is_some() {
            fields.outstanding = self.outstanding;
        }
        if let Some(flag) = self.ledger {
            fields.ledger = flag;
        }
        if let Some(flag) = self.hcf {
            fields.hcf = flag;
        }
        if let Some(flag) = self.invoice {
            fields.invoice = flag;
        }
        if let Some(flag) = self.signin_sheet {
            fields.signin_sheet = flag;
        }
        if self.lien_status.is_some() {
            fields.lien_status = self.lien_status;
        }
        if self.case_status.is_some() {
            fields.case_status = self.case_status;
        }
        if self.hearing_date.is_some() {
            fields.hearing_date = self.hearing_date;
        }
        if self.hearing_time.is_some() {
            fields.hearing_time = self.hearing_time;
        }
        fields.details.merge_from(self.details);

        if touches_billing {
            if let Some(outstanding) = derive_outstanding(fields.bill, fields.paid) {
                fields.outstanding = Some(outstanding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_outstanding() {
        assert_eq!(derive_outstanding(Some(1000.0), Some(400.0)), Some(600.0));
        assert_eq!(derive_outstanding(Some(1000.0), None), Some(1000.0));
        assert_eq!(derive_outstanding(None, Some(5.0)), None);
    }

    #[test]
    fn test_patch_recomputes_outstanding_from_merged_values() {
        let mut fields = RecordFields::new("Clinic", "Pat");
        fields.bill = Some(1000.0);
        fields.paid = Some(400.0);
        fields.outstanding = Some(600.0);

        let patch = RecordPatch {
            paid: Some(1000.0),
            ..Default::default()
        };
        patch.apply_to(&mut fields);

        assert_eq!(fields.outstanding, Some(0.0));
    }

    #[test]
    fn test_patch_leaves_unset_details_alone() {
        let mut fields = RecordFields::new("Clinic", "Pat");
        fields.details.judge_name = Some("Hon. Reyes".to_string());

        let mut patch = RecordPatch::default();
        patch.details.employer = Some("Acme Freight".to_string());
        patch.apply_to(&mut fields);

        assert_eq!(fields.details.judge_name.as_deref(), Some("Hon. Reyes"));
        assert_eq!(fields.details.employer.as_deref(), Some("Acme Freight"));
    }

    #[test]
    fn test_fields_accept_legacy_spellings_and_blank_enums() {
        let fields: RecordFields = serde_json::from_str(
            r#"{
                "provider": "Clinic",
                "ptName": "Pat",
                "caseStatus": "",
                "lienStatus": "filed",
                "hearingDate": "2024-05-06T00:00:00.000Z",
                "AccesCode": "1234",
                "courtRoomlink": "https://court.example/room",
                "status4903_8": "yes"
            }"#,
        )
        .unwrap();

        assert_eq!(fields.case_status, None);
        assert_eq!(fields.lien_status, Some(LienStatus::Filed));
        assert_eq!(fields.hearing_date, NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(fields.details.access_code.as_deref(), Some("1234"));
        assert_eq!(fields.details.status_4903_8, Some(YesNo::Yes));
        assert_eq!(fields.ledger, DocFlag::NotRequired);
    }

    #[test]
    fn test_invalid_enum_rejected() {
        let result: Result<RecordFields, _> =
            serde_json::from_str(r#"{"provider": "Clinic", "ptName": "Pat", "ledger": "maybe"}"#);
        assert!(result.is_err());
    }
}

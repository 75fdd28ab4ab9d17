//! Results of bulk operations and aggregate views

use casedesk_common::UserRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::record::AssignmentHistoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub primary_id: Uuid,
    pub merged_records: usize,
    pub merged_comments: usize,
    pub deleted_duplicates: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignReport {
    pub modified_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub deleted_count: u64,
}

/// Import row that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedImportRow {
    /// 1-based spreadsheet row, header included
    pub row_number: usize,
    pub provider: Option<String>,
    pub pt_name: Option<String>,
    pub error_reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub count: usize,
    pub failed_records: Vec<FailedImportRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummaryEntry {
    pub record_id: Uuid,
    pub provider: String,
    pub pt_name: String,
    pub adj_number: Vec<String>,
    pub assigned_collector: Option<UserRef>,
    pub assigned_by: Option<UserRef>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignment_history: Vec<AssignmentHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub provider: String,
    pub statuses: Vec<StatusCount>,
    pub total_count: u64,
}

/// One page of a list query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

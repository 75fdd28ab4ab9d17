//! Collector assignment endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use casedesk_common::Role;
use serde::Deserialize;

use super::auth::{require_role, CurrentActor, ADMINS};
use crate::error::{ApiError, ApiResult};
use crate::models::{AssignmentSummaryEntry, ReassignReport, Record};
use crate::services::query::{window_end, window_start};
use crate::services::visibility::redact_for_role;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Collector id, or `unassigned`
    pub collector_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignManyRequest {
    #[serde(default)]
    pub record_ids: Vec<String>,
    pub collector_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryWindow {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// PUT /api/records/:id/assign
pub async fn assign_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Json<Record>> {
    require_role(&actor, &[Role::Admin, Role::SuperAdmin, Role::Provider])?;
    if actor.role == Role::Provider {
        state.query().find_visible_by_id(&actor, &id).await?;
    }
    let mut record = state
        .assignments()
        .assign_collector(&id, &body.collector_id, &actor)
        .await?;
    redact_for_role(&mut record, actor.role);
    Ok(Json(record))
}

/// PUT /api/records/reassign-many
pub async fn reassign_many(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<ReassignManyRequest>,
) -> ApiResult<Json<ReassignReport>> {
    require_role(&actor, ADMINS)?;
    if body.record_ids.is_empty() {
        return Err(ApiError::BadRequest("recordIds must not be empty".to_string()));
    }
    let report = state
        .assignments()
        .reassign_many(&body.record_ids, &body.collector_id, &actor)
        .await?;
    Ok(Json(report))
}

/// GET /api/records/assignments/summary
pub async fn assignment_summary(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(window): Query<SummaryWindow>,
) -> ApiResult<Json<Vec<AssignmentSummaryEntry>>> {
    require_role(&actor, ADMINS)?;
    let start = non_blank(window.start_date.as_deref()).map(window_start).transpose()?;
    let end = non_blank(window.end_date.as_deref()).map(window_end).transpose()?;
    Ok(Json(state.query().assignment_summary(start, end).await?))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/records/:id/assign", put(assign_record))
        .route("/api/records/reassign-many", put(reassign_many))
        .route("/api/records/assignments/summary", get(assignment_summary))
}

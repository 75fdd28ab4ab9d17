//! Record CRUD, listing, providers, summary and import

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use casedesk_common::Role;
use serde::Deserialize;

use super::auth::{require_role, CurrentActor, ADMINS};
use crate::error::ApiResult;
use crate::models::{
    DeleteReport, ImportReport, Page, ProviderSummary, Record, RecordFields, RecordListItem,
    RecordPatch,
};
use crate::services::visibility::redact_for_role;
use crate::services::ListQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    #[serde(flatten)]
    pub fields: RecordFields,
    pub assigned_collector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteManyRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Tabular upload already decoded into cells
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
    pub collector_id: Option<String>,
}

/// GET /api/records
pub async fn list_records(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<RecordListItem>>> {
    Ok(Json(state.query().find_all(&actor, &query).await?))
}

/// POST /api/records
pub async fn create_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<CreateRecordRequest>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    require_role(&actor, ADMINS)?;
    let record = state
        .writer()
        .create(body.fields, body.assigned_collector.as_deref(), Some(&actor))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/records/:id
pub async fn get_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Record>> {
    Ok(Json(state.query().find_visible_by_id(&actor, &id).await?))
}

/// PUT /api/records/:id
pub async fn update_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(patch): Json<RecordPatch>,
) -> ApiResult<Json<Record>> {
    state.query().find_visible_by_id(&actor, &id).await?;
    let mut record = state.writer().update(&id, patch, &actor).await?;
    redact_for_role(&mut record, actor.role);
    Ok(Json(record))
}

/// DELETE /api/records/delete-many
pub async fn delete_many(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<DeleteManyRequest>,
) -> ApiResult<Json<DeleteReport>> {
    require_role(&actor, ADMINS)?;
    Ok(Json(state.writer().delete_many(&body.ids).await?))
}

/// GET /api/records/providers
pub async fn list_providers(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.query().unique_providers().await?))
}

/// GET /api/records/summary
pub async fn provider_summary(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<ProviderSummary>>> {
    require_role(
        &actor,
        &[Role::Admin, Role::SuperAdmin, Role::Collector, Role::Provider],
    )?;
    Ok(Json(state.summary().provider_summary(&actor).await?))
}

/// POST /api/records/import
pub async fn import_records(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<ImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    require_role(&actor, ADMINS)?;
    let report = state
        .importer()
        .import(&body.headers, &body.rows, body.collector_id.as_deref(), Some(&actor))
        .await?;
    Ok(Json(report))
}

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/api/records", get(list_records).post(create_record))
        .route("/api/records/import", post(import_records))
        .route("/api/records/delete-many", delete(delete_many))
        .route("/api/records/providers", get(list_providers))
        .route("/api/records/summary", get(provider_summary))
        .route("/api/records/:id", get(get_record).put(update_record))
}

//! Duplicate detection and merge endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::auth::{require_role, CurrentActor, ADMINS};
use crate::error::ApiResult;
use crate::models::{MergeReport, Record};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub primary_id: String,
    #[serde(default)]
    pub duplicate_ids: Vec<String>,
}

/// GET /api/records/duplicates
pub async fn find_duplicates(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<Record>>> {
    require_role(&actor, ADMINS)?;
    Ok(Json(state.duplicates().find_duplicates().await?))
}

/// POST /api/records/duplicates/merge
pub async fn merge_duplicates(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<MergeRequest>,
) -> ApiResult<Json<MergeReport>> {
    require_role(&actor, ADMINS)?;
    let report = state
        .duplicates()
        .merge_selected(&body.primary_id, &body.duplicate_ids)
        .await?;
    Ok(Json(report))
}

pub fn duplicate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/records/duplicates", get(find_duplicates))
        .route("/api/records/duplicates/merge", post(merge_duplicates))
}

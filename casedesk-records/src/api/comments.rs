//! Comment timeline endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};

use super::auth::CurrentActor;
use crate::error::ApiResult;
use crate::models::Record;
use crate::services::comments::CommentPatch;
use crate::services::NewComment;
use crate::AppState;

/// POST /api/records/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(body): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    state.query().find_visible_by_id(&actor, &id).await?;
    let record = state.comments().add_comment(&id, body, &actor).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/records/:id/comments/:comment_id
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((id, comment_id)): Path<(String, String)>,
    Json(body): Json<CommentPatch>,
) -> ApiResult<Json<Record>> {
    state.query().find_visible_by_id(&actor, &id).await?;
    let record = state
        .comments()
        .update_comment(&id, &comment_id, body, &actor)
        .await?;
    Ok(Json(record))
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/records/:id/comments", post(add_comment))
        .route("/api/records/:id/comments/:comment_id", put(update_comment))
}

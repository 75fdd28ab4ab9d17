//! Calendar and notification endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use casedesk_common::time::parse_calendar_date;
use chrono::NaiveDate;
use serde::Deserialize;

use super::auth::{require_role, CurrentActor, ADMINS};
use crate::error::ApiResult;
use crate::models::{HearingEvent, Notification, OverdueEvent, ScheduledEvent};
use crate::AppState;

/// Optional calendar window, dates as `YYYY-MM-DD`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateWindow {
    fn bounds(&self) -> casedesk_common::Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let parse = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(parse_calendar_date)
                .transpose()
        };
        Ok((parse(&self.start_date)?, parse(&self.end_date)?))
    }
}

/// GET /api/records/scheduled-events
pub async fn scheduled_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(window): Query<DateWindow>,
) -> ApiResult<Json<Vec<ScheduledEvent>>> {
    let (start, end) = window.bounds()?;
    Ok(Json(state.events().scheduled_events(&actor, start, end).await?))
}

/// GET /api/records/notifications
pub async fn notifications(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.events().notifications(&actor).await?))
}

/// GET /api/records/overdue-events
pub async fn overdue_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<OverdueEvent>>> {
    require_role(&actor, ADMINS)?;
    Ok(Json(state.events().overdue_events().await?))
}

/// GET /api/records/hearing-events
pub async fn hearing_events(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
    Query(window): Query<DateWindow>,
) -> ApiResult<Json<Vec<HearingEvent>>> {
    let (start, end) = window.bounds()?;
    Ok(Json(state.events().hearing_events(start, end).await?))
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/records/scheduled-events", get(scheduled_events))
        .route("/api/records/notifications", get(notifications))
        .route("/api/records/overdue-events", get(overdue_events))
        .route("/api/records/hearing-events", get(hearing_events))
}

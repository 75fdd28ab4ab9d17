//! casedesk-records library - record, timeline and assignment service
//!
//! Engines live in [`services`] and own all business rules; [`api`] is a thin
//! axum layer that resolves the caller and maps errors to HTTP statuses.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

use services::{
    AssignmentEngine, CommentEngine, DuplicateEngine, EventEngine, ImportEngine, RecordQuery,
    RecordWriter, SummaryEngine,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn writer(&self) -> RecordWriter {
        RecordWriter::new(self.db.clone())
    }

    pub fn query(&self) -> RecordQuery {
        RecordQuery::new(self.db.clone())
    }

    pub fn assignments(&self) -> AssignmentEngine {
        AssignmentEngine::new(self.db.clone())
    }

    pub fn comments(&self) -> CommentEngine {
        CommentEngine::new(self.db.clone())
    }

    pub fn events(&self) -> EventEngine {
        EventEngine::new(self.db.clone())
    }

    pub fn duplicates(&self) -> DuplicateEngine {
        DuplicateEngine::new(self.db.clone())
    }

    pub fn summary(&self) -> SummaryEngine {
        SummaryEngine::new(self.db.clone())
    }

    pub fn importer(&self) -> ImportEngine {
        ImportEngine::new(self.db.clone())
    }
}

/// Build application router
///
/// `/health` needs no identity; every `/api` route requires the gateway
/// identity headers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::record_routes())
        .merge(api::assignment_routes())
        .merge(api::comment_routes())
        .merge(api::event_routes())
        .merge(api::duplicate_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

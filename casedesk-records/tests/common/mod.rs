//! Shared fixtures for the integration tests

#![allow(dead_code)]

use casedesk_common::db::{create_user, init_database, NewUser};
use casedesk_common::{Role, User};
use casedesk_records::models::{CheckCopy, CommentStatus, Record, RecordFields};
use casedesk_records::services::{NewComment, RecordWriter};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Fresh database in a temporary directory; keep the guard alive
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn setup() -> TestDb {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("casedesk.db")).await.unwrap();
    TestDb { pool, _dir: dir }
}

pub async fn user(pool: &SqlitePool, username: &str, full_name: &str, role: Role) -> User {
    create_user(pool, NewUser::new(username, full_name, role))
        .await
        .unwrap()
}

pub async fn admin(pool: &SqlitePool) -> User {
    user(pool, "admin", "Office Admin", Role::Admin).await
}

pub async fn record(pool: &SqlitePool, provider: &str, pt_name: &str) -> Record {
    RecordWriter::new(pool.clone())
        .create(RecordFields::new(provider, pt_name), None, None)
        .await
        .unwrap()
}

pub async fn record_with(pool: &SqlitePool, fields: RecordFields, collector: Option<&User>) -> Record {
    let collector_id = collector.map(|c| c.id.to_string());
    RecordWriter::new(pool.clone())
        .create(fields, collector_id.as_deref(), None)
        .await
        .unwrap()
}

pub fn scheduled(text: &str, status: CommentStatus, date: (i32, u32, u32), time: Option<&str>) -> NewComment {
    let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
    NewComment::new(text, status).scheduled(date, time)
}

pub fn payment_received() -> NewComment {
    let mut input = NewComment::new("Check received", CommentStatus::PaymentReceived);
    input.check_number = Some("5521".to_string());
    input.check_date = NaiveDate::from_ymd_opt(2024, 6, 3);
    input.check_amount = Some(400.0);
    input.check_copy = Some(CheckCopy {
        file_name: "check.png".to_string(),
        mime_type: "image/png".to_string(),
        base64: "iVBORw0KGgo=".to_string(),
    });
    input
}

//! Concurrent writers on a shared pool
//!
//! Independent requests must queue on the write lock instead of failing
//! with "database is locked".

mod common;

use casedesk_common::Role;
use casedesk_records::models::{CommentStatus, RecordFields};
use casedesk_records::services::{
    AssignmentEngine, CommentEngine, NewComment, RecordQuery, RecordWriter,
};
use common::*;
use std::collections::HashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_comments_on_many_records_all_succeed() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    user(&db.pool, "r1", "Red", Role::PaymentRedeemer).await;
    user(&db.pool, "r2", "Rose", Role::PaymentRedeemer).await;

    let mut ids = Vec::new();
    for i in 0..16 {
        ids.push(record(&db.pool, "Acme", &format!("P{}", i)).await.id.to_string());
    }

    let mut handles = Vec::new();
    for round in 0..5 {
        for id in &ids {
            let engine = CommentEngine::new(db.pool.clone());
            let actor = admin.as_actor();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .add_comment(&id, NewComment::new(format!("wfp {}", round), CommentStatus::Wfp), &actor)
                    .await
            }));
        }
    }

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            failures.push(e.to_string());
        }
    }
    assert!(failures.is_empty(), "{} of 80 failed: {:?}", failures.len(), failures.first());

    let query = RecordQuery::new(db.pool.clone());
    for id in &ids {
        let record = query.find_by_id(id).await.unwrap();
        assert_eq!(record.comments.len(), 5);
        assert!(record.redeemer_id().is_some());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_assignments_and_creates_all_succeed() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let collector = user(&db.pool, "c1", "Cole", Role::Collector).await;

    let mut ids = Vec::new();
    for i in 0..40 {
        ids.push(record(&db.pool, "Acme", &format!("P{}", i)).await.id.to_string());
    }

    let mut assigns = Vec::new();
    for id in ids.clone() {
        let engine = AssignmentEngine::new(db.pool.clone());
        let actor = admin.as_actor();
        let collector_id = collector.id.to_string();
        assigns.push(tokio::spawn(async move {
            engine.assign_collector(&id, &collector_id, &actor).await
        }));
    }

    let mut creates = Vec::new();
    for i in 0..20 {
        let writer = RecordWriter::new(db.pool.clone());
        creates.push(tokio::spawn(async move {
            writer
                .create(RecordFields::new("Zeta", format!("New {}", i)), None, None)
                .await
        }));
    }

    for handle in assigns {
        let record = handle.await.unwrap().unwrap();
        assert_eq!(record.collector_id(), Some(collector.id));
        assert_eq!(record.assignment_history.len(), 1);
    }

    let mut references = HashSet::new();
    for handle in creates {
        let record = handle.await.unwrap().unwrap();
        assert!(references.insert(record.reference_id));
    }
    assert_eq!(references.len(), 20);
}

//! Role-scoped listing, search, categories and summaries

mod common;

use casedesk_common::{Actor, Error, Role};
use casedesk_records::models::{CaseStatus, CommentStatus, MultiEntry, RecordFields};
use casedesk_records::services::query::{window_end, window_start};
use casedesk_records::services::{
    AssignmentEngine, CommentEngine, ListQuery, NewComment, RecordQuery, SummaryEngine,
};
use common::*;
use uuid::Uuid;

fn provider_actor(full_name: &str) -> Actor {
    Actor::new(Uuid::new_v4(), Role::Provider, "portal").with_full_name(full_name)
}

#[tokio::test]
async fn test_provider_sees_only_own_records() {
    let db = setup().await;
    let r1 = record(&db.pool, " acme clinic ", "Pat Doe").await;
    record(&db.pool, "Other Clinic", "Sam Roe").await;
    let query = RecordQuery::new(db.pool.clone());

    let page = query
        .find_all(&provider_actor("Acme Clinic"), &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.id, r1.id);

    let page = query
        .find_all(&provider_actor("Nobody Medical"), &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.data.is_empty());

    let err = query
        .find_visible_by_id(&provider_actor("Other Clinic"), &r1.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_collector_pinned_to_own_queue() {
    let db = setup().await;
    let mine = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let theirs = user(&db.pool, "c2", "Other", Role::Collector).await;
    let a = record_with(&db.pool, RecordFields::new("Acme", "A"), Some(&mine)).await;
    record_with(&db.pool, RecordFields::new("Acme", "B"), Some(&theirs)).await;
    record(&db.pool, "Acme", "C").await;
    let query = RecordQuery::new(db.pool.clone());

    let asked_for_other = ListQuery {
        collector_id: Some(theirs.id.to_string()),
        ..Default::default()
    };
    let page = query.find_all(&mine.as_actor(), &asked_for_other).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.id, a.id);

    let unassigned = ListQuery {
        collector_id: Some("unassigned".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        query.find_all(&mine.as_actor(), &unassigned).await,
        Err(Error::InvalidArgument(_))
    ));

    let admin = admin(&db.pool).await;
    let page = query.find_all(&admin.as_actor(), &unassigned).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.fields.pt_name, "C");
}

#[tokio::test]
async fn test_collector_keeps_access_to_worked_records() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let first = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let second = user(&db.pool, "c2", "Other", Role::Collector).await;
    let rec = record_with(&db.pool, RecordFields::new("Acme", "Pat"), Some(&first)).await;
    let id = rec.id.to_string();

    CommentEngine::new(db.pool.clone())
        .add_comment(&id, NewComment::new("Spoke to adjuster", CommentStatus::SpokeTo), &first.as_actor())
        .await
        .unwrap();
    AssignmentEngine::new(db.pool.clone())
        .assign_collector(&id, &second.id.to_string(), &admin.as_actor())
        .await
        .unwrap();

    let query = RecordQuery::new(db.pool.clone());
    assert!(query.find_visible_by_id(&first.as_actor(), &id).await.is_ok());

    let stranger = user(&db.pool, "c3", "Stranger", Role::Collector).await;
    assert!(matches!(
        query.find_visible_by_id(&stranger.as_actor(), &id).await,
        Err(Error::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_categories_split_on_collector_comments() {
    let db = setup().await;
    let collector = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let worked = record_with(&db.pool, RecordFields::new("Acme", "Worked"), Some(&collector)).await;
    let fresh = record_with(&db.pool, RecordFields::new("Acme", "Fresh"), Some(&collector)).await;

    CommentEngine::new(db.pool.clone())
        .add_comment(
            &worked.id.to_string(),
            NewComment::new("Left voicemail", CommentStatus::Lvm),
            &collector.as_actor(),
        )
        .await
        .unwrap();

    let query = RecordQuery::new(db.pool.clone());
    let history = query
        .find_all(
            &collector.as_actor(),
            &ListQuery {
                category: Some("history".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.data[0].record.id, worked.id);
    assert!(history.data[0].last_comment_date.is_some());

    let active = query
        .find_all(
            &collector.as_actor(),
            &ListQuery {
                category: Some("active".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.data[0].record.id, fresh.id);
    assert!(active.data[0].last_comment_date.is_none());
}

#[tokio::test]
async fn test_search_covers_adjuster_numbers_and_comment_statuses() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let mut fields = RecordFields::new("Acme", "Pat Doe");
    fields.adj_number = vec![MultiEntry::new("ADJ-7781")];
    let by_adj = record_with(&db.pool, fields, None).await;
    let by_status = record(&db.pool, "Zeta", "Sam Roe").await;
    record(&db.pool, "Zeta", "Unrelated").await;

    CommentEngine::new(db.pool.clone())
        .add_comment(
            &by_status.id.to_string(),
            NewComment::new("Sent the packet", CommentStatus::SentEmailFax),
            &admin.as_actor(),
        )
        .await
        .unwrap();

    let query = RecordQuery::new(db.pool.clone());
    let search = |term: &str| ListQuery {
        search: Some(term.to_string()),
        ..Default::default()
    };

    let page = query.find_all(&admin.as_actor(), &search("adj-77")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.id, by_adj.id);

    let page = query.find_all(&admin.as_actor(), &search("email_fax")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.id, by_status.id);

    let page = query.find_all(&admin.as_actor(), &search(&by_adj.reference_id)).await.unwrap();
    assert_eq!(page.total, 1);

    // `_` is literal, not a wildcard
    let page = query.find_all(&admin.as_actor(), &search("Pat_Doe")).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_pagination_newest_first() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    for i in 0..7 {
        record(&db.pool, "Acme", &format!("P{}", i)).await;
    }
    let query = RecordQuery::new(db.pool.clone());

    let page = query
        .find_all(
            &admin.as_actor(),
            &ListQuery {
                page: Some(2),
                limit: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.page, 2);
    assert_eq!(page.limit, 3);
    let names: Vec<_> = page.data.iter().map(|i| i.record.fields.pt_name.clone()).collect();
    assert_eq!(names, vec!["P3", "P2", "P1"]);
}

#[tokio::test]
async fn test_redeemer_lists_only_wfp_queue() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let redeemer = user(&db.pool, "r1", "Red", Role::PaymentRedeemer).await;
    let queued = record(&db.pool, "Acme", "Queued").await;
    record(&db.pool, "Acme", "Idle").await;

    CommentEngine::new(db.pool.clone())
        .add_comment(&queued.id.to_string(), NewComment::new("Awaiting", CommentStatus::Wfp), &admin.as_actor())
        .await
        .unwrap();

    let page = RecordQuery::new(db.pool.clone())
        .find_all(&redeemer.as_actor(), &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].record.id, queued.id);
}

#[tokio::test]
async fn test_unique_providers_sorted_and_distinct() {
    let db = setup().await;
    record(&db.pool, "Zeta", "A").await;
    record(&db.pool, "Acme", "B").await;
    record(&db.pool, "Acme", "C").await;

    let providers = RecordQuery::new(db.pool.clone()).unique_providers().await.unwrap();
    assert_eq!(providers, vec!["Acme".to_string(), "Zeta".to_string()]);
}

#[tokio::test]
async fn test_provider_summary_counts_standard_statuses() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    for (provider, status) in [
        ("Acme", Some(CaseStatus::Settled)),
        ("Acme", Some(CaseStatus::Settled)),
        ("Acme", Some(CaseStatus::CicPending)),
        ("Acme", Some(CaseStatus::AAndSGranted)),
        ("Zeta", Some(CaseStatus::CAndRGranted)),
        ("Zeta", None),
    ] {
        let mut fields = RecordFields::new(provider, "Pat");
        fields.case_status = status;
        record_with(&db.pool, fields, None).await;
    }
    let engine = SummaryEngine::new(db.pool.clone());

    let summary = engine.provider_summary(&admin.as_actor()).await.unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].provider, "Acme");
    assert_eq!(summary[0].total_count, 3);
    assert_eq!(summary[1].provider, "Zeta");
    assert_eq!(summary[1].statuses[0].status, "C & R (GRANTED)");

    let scoped = engine.provider_summary(&provider_actor("zeta")).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].provider, "Zeta");
}

#[tokio::test]
async fn test_assignment_summary_window() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let collector = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let assigned = record(&db.pool, "Acme", "Assigned").await;
    record(&db.pool, "Acme", "Never").await;

    AssignmentEngine::new(db.pool.clone())
        .assign_collector(&assigned.id.to_string(), &collector.id.to_string(), &admin.as_actor())
        .await
        .unwrap();

    let query = RecordQuery::new(db.pool.clone());
    let start = window_start("2000-01-01").unwrap();
    let end = window_end("2999-12-31").unwrap();

    let entries = query.assignment_summary(Some(start), Some(end)).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, assigned.id);
    assert_eq!(entries[0].assignment_history.len(), 1);

    let past = query
        .assignment_summary(Some(window_start("2000-01-01").unwrap()), Some(window_end("2000-01-02").unwrap()))
        .await
        .unwrap();
    assert!(past.is_empty());

    let everything = query.assignment_summary(None, None).await.unwrap();
    assert_eq!(everything.len(), 1);
}

#[tokio::test]
async fn test_provider_listing_and_lookup_agree_on_padding() {
    let db = setup().await;
    let tabbed = record(&db.pool, "Acme", "Tabbed").await;
    let nbsp = record(&db.pool, "Acme", "Nbsp").await;
    for (id, provider) in [(tabbed.id, "\tAcme\n"), (nbsp.id, "\u{a0}Acme\u{a0}")] {
        sqlx::query("UPDATE records SET provider = ? WHERE id = ?")
            .bind(provider)
            .bind(id.to_string())
            .execute(&db.pool)
            .await
            .unwrap();
    }

    let actor = provider_actor("Acme");
    let query = RecordQuery::new(db.pool.clone());
    let page = query.find_all(&actor, &ListQuery::default()).await.unwrap();
    let listed: Vec<_> = page.data.iter().map(|i| i.record.id).collect();
    assert_eq!(listed, vec![tabbed.id]);

    assert!(query.find_visible_by_id(&actor, &tabbed.id.to_string()).await.is_ok());
    assert!(matches!(
        query.find_visible_by_id(&actor, &nbsp.id.to_string()).await,
        Err(Error::Forbidden(_))
    ));
}

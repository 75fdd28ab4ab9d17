//! Calendar, notification and overdue projections over stored timelines

mod common;

use casedesk_common::Role;
use casedesk_records::models::{CommentStatus, NotificationKind, RecordFields};
use casedesk_records::services::{CommentEngine, EventEngine, NewComment};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::*;

#[tokio::test]
async fn test_spring_forward_follow_up_converts_with_dst() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let rec = record(&db.pool, "Acme", "Pat").await;

    CommentEngine::new(db.pool.clone())
        .add_comment(
            &rec.id.to_string(),
            scheduled("Early call", CommentStatus::Callback, (2024, 3, 10), Some("02:30")),
            &admin.as_actor(),
        )
        .await
        .unwrap();

    let events = EventEngine::new(db.pool.clone())
        .scheduled_events(&admin.as_actor(), None, None)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    // 02:30 does not exist that morning; it reads as 03:30 PDT
    assert_eq!(
        events[0].scheduled_at,
        Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_scheduled_events_respect_window_and_latest_comment() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let in_window = record(&db.pool, "Acme", "In").await;
    let outside = record(&db.pool, "Acme", "Out").await;
    let engine = CommentEngine::new(db.pool.clone());

    engine
        .add_comment(&in_window.id.to_string(), scheduled("First", CommentStatus::Callback, (2024, 5, 1), None), &admin.as_actor())
        .await
        .unwrap();
    engine
        .add_comment(&in_window.id.to_string(), scheduled("Second", CommentStatus::Offer, (2024, 5, 3), Some("14:00")), &admin.as_actor())
        .await
        .unwrap();
    engine
        .add_comment(&outside.id.to_string(), scheduled("Later", CommentStatus::Callback, (2024, 7, 1), None), &admin.as_actor())
        .await
        .unwrap();

    let events = EventEngine::new(db.pool.clone())
        .scheduled_events(
            &admin.as_actor(),
            NaiveDate::from_ymd_opt(2024, 5, 1),
            NaiveDate::from_ymd_opt(2024, 5, 31),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record_id, in_window.id);
    assert_eq!(events[0].text, "Second");
    assert_eq!(events[0].scheduled_time.as_deref(), Some("14:00"));
}

#[tokio::test]
async fn test_collector_sees_upcoming_admin_sees_overdue() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let collector = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let rec = record_with(&db.pool, RecordFields::new("Acme", "Pat"), Some(&collector)).await;

    // 10:00 PDT is 17:00 UTC
    CommentEngine::new(db.pool.clone())
        .add_comment(
            &rec.id.to_string(),
            scheduled("Call adjuster", CommentStatus::Callback, (2024, 5, 1), Some("10:00")),
            &collector.as_actor(),
        )
        .await
        .unwrap();
    let events = EventEngine::new(db.pool.clone());

    let before = Utc.with_ymd_and_hms(2024, 5, 1, 16, 30, 0).unwrap();
    let upcoming = events.notifications_at(&collector.as_actor(), before).await.unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].kind, NotificationKind::Upcoming);
    assert!(events.notifications_at(&admin.as_actor(), before).await.unwrap().is_empty());

    let just_due = Utc.with_ymd_and_hms(2024, 5, 1, 17, 30, 0).unwrap();
    assert!(events.notifications_at(&collector.as_actor(), just_due).await.unwrap().is_empty());

    let late = Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap();
    let overdue = events.notifications_at(&admin.as_actor(), late).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert!(overdue[0].is_overdue);

    let verifier = user(&db.pool, "v1", "Vera", Role::Verifier).await;
    assert!(events.notifications_at(&verifier.as_actor(), late).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fresh_assignment_is_announced_until_touched() {
    let db = setup().await;
    let collector = user(&db.pool, "c1", "Cole", Role::Collector).await;
    let rec = record_with(&db.pool, RecordFields::new("Acme", "Pat Doe"), Some(&collector)).await;
    let events = EventEngine::new(db.pool.clone());

    let alerts = events.notifications(&collector.as_actor()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].is_assignment);
    assert_eq!(alerts[0].status, "Assigned");
    assert_eq!(alerts[0].text, "New record assigned: Pat Doe");

    CommentEngine::new(db.pool.clone())
        .add_comment(&rec.id.to_string(), NewComment::new("Picked up", CommentStatus::SpokeTo), &collector.as_actor())
        .await
        .unwrap();
    assert!(events.notifications(&collector.as_actor()).await.unwrap().is_empty());

    let much_later = Utc::now() + Duration::hours(3);
    let other = user(&db.pool, "c2", "Other", Role::Collector).await;
    record_with(&db.pool, RecordFields::new("Acme", "Sam"), Some(&other)).await;
    assert!(events.notifications_at(&other.as_actor(), much_later).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overdue_sweep_uses_end_of_pacific_day_for_untimed() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let rec = record(&db.pool, "Acme", "Pat").await;

    CommentEngine::new(db.pool.clone())
        .add_comment(
            &rec.id.to_string(),
            scheduled("Follow up", CommentStatus::Callback, (2024, 1, 15), None),
            &admin.as_actor(),
        )
        .await
        .unwrap();
    let events = EventEngine::new(db.pool.clone());

    // End of 2024-01-15 PST is 2024-01-16 08:00 UTC
    let same_day = Utc.with_ymd_and_hms(2024, 1, 16, 7, 0, 0).unwrap();
    assert!(events.overdue_events_at(same_day).await.unwrap().is_empty());

    let next_day = Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap();
    let overdue = events.overdue_events_at(next_day).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].record_id, rec.id);
}

#[tokio::test]
async fn test_hearing_events_in_window_sorted() {
    let db = setup().await;
    for (name, day) in [("Late", 20), ("Early", 2), ("Outside", 0)] {
        let mut fields = RecordFields::new("Acme", name);
        fields.hearing_date = if day == 0 {
            NaiveDate::from_ymd_opt(2024, 9, 1)
        } else {
            NaiveDate::from_ymd_opt(2024, 8, day)
        };
        record_with(&db.pool, fields, None).await;
    }
    record(&db.pool, "Acme", "No hearing").await;

    let hearings = EventEngine::new(db.pool.clone())
        .hearing_events(NaiveDate::from_ymd_opt(2024, 8, 1), NaiveDate::from_ymd_opt(2024, 8, 31))
        .await
        .unwrap();
    let names: Vec<_> = hearings.iter().map(|h| h.pt_name.as_str()).collect();
    assert_eq!(names, vec!["Early", "Late"]);
}

#[tokio::test]
async fn test_redeemer_calendar_shows_only_wfp_follow_ups() {
    let db = setup().await;
    let admin = admin(&db.pool).await;
    let redeemer = user(&db.pool, "r1", "Red", Role::PaymentRedeemer).await;
    let rec = record(&db.pool, "Acme", "Pat").await;
    let engine = CommentEngine::new(db.pool.clone());
    let id = rec.id.to_string();

    engine
        .add_comment(&id, scheduled("Check due", CommentStatus::Wfp, (2024, 6, 1), None), &admin.as_actor())
        .await
        .unwrap();

    let events = EventEngine::new(db.pool.clone())
        .scheduled_events(&redeemer.as_actor(), None, None)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, CommentStatus::Wfp);
}

use chrono::NaiveDate;
use rocket::tokio;

use crate::db::{
    create_session, delete_session, ensure_session, get_session, list_sessions, update_session,
};
use crate::error::AppError;
use crate::models::{NewSession, Patch, SessionFilter, SessionPatch};
use crate::test::utils::TestDbBuilder;

fn date(s: &str) -> NaiveDate {
    s.parse().expect("Invalid date literal")
}

fn new_session(week: i64, day: i64, scheduled_date: &str) -> NewSession {
    NewSession {
        workout_template_id: None,
        scheduled_date: date(scheduled_date),
        week_number: week,
        day_number: day,
        sleep_quality: None,
        energy_level: None,
        notes: None,
        is_completed: None,
        completed_date: None,
    }
}

#[tokio::test]
async fn create_returns_input_fields_and_defaults() {
    let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
    let user_id = test_db.user_id("alice");

    let created = create_session(&test_db.pool, user_id, &new_session(1, 0, "2024-01-01"))
        .await
        .expect("Failed to create session");

    assert_eq!(created.week_number, 1);
    assert_eq!(created.day_number, 0);
    assert_eq!(created.scheduled_date, date("2024-01-01"));
    assert!(!created.is_completed);
    assert!(created.completed_date.is_none());
    assert!(created.workout_name.is_none());
}

#[tokio::test]
async fn merge_patch_leaves_unset_fields_untouched() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .rated_session("alice", 1, 0, "2024-01-01", 4, 3)
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");
    let session_id = test_db.session_id("alice", 1, 0);

    let patch = SessionPatch {
        notes: Patch::Set("felt strong".to_string()),
        ..SessionPatch::default()
    };

    let updated = update_session(&test_db.pool, user_id, session_id, &patch)
        .await
        .expect("Failed to update session");

    assert_eq!(updated.notes.as_deref(), Some("felt strong"));
    assert_eq!(updated.sleep_quality, Some(4));
    assert_eq!(updated.energy_level, Some(3));
    assert!(!updated.is_completed);
    assert!(updated.completed_date.is_none());
}

#[tokio::test]
async fn completing_a_session_does_not_invent_completed_date() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .session("alice", 1, 0, "2024-01-01")
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");
    let session_id = test_db.session_id("alice", 1, 0);

    let patch = SessionPatch {
        is_completed: Patch::Set(true),
        ..SessionPatch::default()
    };

    let updated = update_session(&test_db.pool, user_id, session_id, &patch)
        .await
        .expect("Failed to update session");

    assert!(updated.is_completed);
    assert!(updated.completed_date.is_none());
}

#[tokio::test]
async fn explicit_null_clears_a_nullable_field() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .rated_session("alice", 1, 0, "2024-01-01", 4, 3)
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");
    let session_id = test_db.session_id("alice", 1, 0);

    let patch = SessionPatch {
        sleep_quality: Patch::Clear,
        ..SessionPatch::default()
    };

    let updated = update_session(&test_db.pool, user_id, session_id, &patch)
        .await
        .expect("Failed to update session");

    assert_eq!(updated.sleep_quality, None);
    assert_eq!(updated.energy_level, Some(3));
}

#[tokio::test]
async fn update_and_delete_are_scoped_to_the_owner() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .user("mallory")
        .session("alice", 1, 0, "2024-01-01")
        .build()
        .await
        .unwrap();
    let mallory = test_db.user_id("mallory");
    let session_id = test_db.session_id("alice", 1, 0);

    let update = update_session(&test_db.pool, mallory, session_id, &SessionPatch::default()).await;
    assert!(matches!(update, Err(AppError::NotFound(_))));

    let delete = delete_session(&test_db.pool, mallory, session_id).await;
    assert!(matches!(delete, Err(AppError::NotFound(_))));

    // Still present for the owner
    let alice = test_db.user_id("alice");
    assert!(get_session(&test_db.pool, alice, session_id).await.is_ok());
}

#[tokio::test]
async fn delete_missing_session_returns_not_found() {
    let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
    let user_id = test_db.user_id("alice");

    let result = delete_session(&test_db.pool, user_id, 9999).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn delete_cascades_exercise_logs() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .exercise("Bench Press", "strength")
        .completed_session("alice", 1, 0, "2024-01-01")
        .weight_log("alice", 1, 0, "Bench Press", 1, 5, 135.0)
        .weight_log("alice", 1, 0, "Bench Press", 2, 5, 135.0)
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");
    let session_id = test_db.session_id("alice", 1, 0);

    assert_eq!(test_db.exercise_log_count(session_id).await, 2);

    delete_session(&test_db.pool, user_id, session_id)
        .await
        .expect("Failed to delete session");

    assert_eq!(test_db.exercise_log_count(session_id).await, 0);
}

#[tokio::test]
async fn duplicate_slot_create_conflicts() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .session("alice", 2, 3, "2024-01-11")
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");

    let result = create_session(&test_db.pool, user_id, &new_session(2, 3, "2024-01-11")).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn ensure_session_is_idempotent() {
    let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
    let user_id = test_db.user_id("alice");

    let first = ensure_session(&test_db.pool, user_id, &new_session(3, 1, "2024-01-16"))
        .await
        .expect("First ensure failed");
    let second = ensure_session(&test_db.pool, user_id, &new_session(3, 1, "2024-01-16"))
        .await
        .expect("Second ensure failed");

    assert_eq!(first.id, second.id);

    let sessions = list_sessions(&test_db.pool, user_id, &SessionFilter::default())
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn list_filters_and_orders_by_date_descending() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .user("bob")
        .session("alice", 1, 0, "2024-01-01")
        .completed_session("alice", 1, 2, "2024-01-03")
        .session("alice", 2, 0, "2024-01-08")
        .session("bob", 1, 0, "2024-01-01")
        .build()
        .await
        .unwrap();
    let alice = test_db.user_id("alice");

    let all = list_sessions(&test_db.pool, alice, &SessionFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].scheduled_date, date("2024-01-08"));
    assert_eq!(all[2].scheduled_date, date("2024-01-01"));

    let week_one = list_sessions(
        &test_db.pool,
        alice,
        &SessionFilter {
            week: Some(1),
            ..SessionFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(week_one.len(), 2);

    let completed = list_sessions(
        &test_db.pool,
        alice,
        &SessionFilter {
            completed: Some(true),
            ..SessionFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].day_number, 2);

    let paged = list_sessions(
        &test_db.pool,
        alice,
        &SessionFilter {
            limit: Some(1),
            offset: Some(1),
            ..SessionFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].scheduled_date, date("2024-01-03"));
}

#[tokio::test]
async fn get_session_embeds_ordered_logs() {
    let test_db = TestDbBuilder::new()
        .user("alice")
        .exercise("Squat", "strength")
        .exercise("Plank", "core")
        .completed_session("alice", 1, 0, "2024-01-01")
        .log("alice", 1, 0, "Plank", 2, None, None, Some(60))
        .log("alice", 1, 0, "Squat", 1, Some(8), Some(185.0), None)
        .build()
        .await
        .unwrap();
    let user_id = test_db.user_id("alice");
    let session_id = test_db.session_id("alice", 1, 0);

    let detail = get_session(&test_db.pool, user_id, session_id)
        .await
        .expect("Failed to fetch session detail");

    assert_eq!(detail.exercise_logs.len(), 2);
    assert_eq!(detail.exercise_logs[0].exercise_name, "Squat");
    assert_eq!(detail.exercise_logs[0].weight_lbs, Some(185.0));
    assert_eq!(detail.exercise_logs[1].exercise_name, "Plank");
    assert_eq!(detail.exercise_logs[1].duration_seconds, Some(60));
}

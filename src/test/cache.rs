use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, TimeZone, Utc};
use rocket::tokio;

use crate::client::{WorkoutCache, WorkoutTransport, scheduled_date_for_slot};
use crate::models::{NewSession, Patch, SessionFilter, SessionPatch, WorkoutSession};

fn date(s: &str) -> NaiveDate {
    s.parse().expect("Invalid date literal")
}

#[derive(Default)]
struct FakeTransport {
    sessions: Mutex<Vec<WorkoutSession>>,
    next_id: Mutex<i64>,
}

impl FakeTransport {
    fn with_sessions(sessions: Vec<WorkoutSession>) -> Self {
        let next_id = sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        Self {
            sessions: Mutex::new(sessions),
            next_id: Mutex::new(next_id),
        }
    }

    fn stored(&self) -> Vec<WorkoutSession> {
        self.sessions.lock().unwrap().clone()
    }
}

fn session_from_new(id: i64, new: &NewSession) -> WorkoutSession {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    WorkoutSession {
        id,
        workout_template_id: new.workout_template_id,
        scheduled_date: new.scheduled_date,
        completed_date: None,
        duration_minutes: None,
        is_completed: new.is_completed.unwrap_or(false),
        week_number: new.week_number,
        day_number: new.day_number,
        sleep_quality: new.sleep_quality,
        energy_level: new.energy_level,
        soreness_level: None,
        notes: new.notes.clone(),
        overall_rating: None,
        workout_name: None,
        workout_type: None,
        phase: None,
        created_at: now,
        updated_at: now,
    }
}

impl WorkoutTransport for FakeTransport {
    async fn list_sessions(&self, _filter: SessionFilter) -> Result<Vec<WorkoutSession>> {
        Ok(self.stored())
    }

    async fn create_session(&self, new: NewSession) -> Result<WorkoutSession> {
        let mut next_id = self.next_id.lock().unwrap();
        let session = session_from_new(*next_id, &new);
        *next_id += 1;

        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn update_session(&self, id: i64, patch: SessionPatch) -> Result<WorkoutSession> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("Session {} not found", id))?;

        session.is_completed = patch.is_completed.set_or(session.is_completed);
        session.duration_minutes = patch.duration_minutes.apply(session.duration_minutes.take());
        session.sleep_quality = patch.sleep_quality.apply(session.sleep_quality.take());
        session.energy_level = patch.energy_level.apply(session.energy_level.take());
        session.notes = patch.notes.apply(session.notes.take());

        Ok(session.clone())
    }

    async fn delete_session(&self, id: i64) -> Result<()> {
        self.sessions.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }
}

#[test]
fn slot_dates_anchor_to_the_monday_of_the_current_week() {
    // 2024-01-03 is a Wednesday; its Monday is 2024-01-01
    let today = date("2024-01-03");

    assert_eq!(scheduled_date_for_slot(today, 1, 0), date("2024-01-01"));
    assert_eq!(scheduled_date_for_slot(today, 1, 6), date("2024-01-07"));
    assert_eq!(scheduled_date_for_slot(today, 2, 3), date("2024-01-11"));
    assert_eq!(scheduled_date_for_slot(today, 12, 6), date("2024-03-24"));

    // A Sunday still anchors back to the Monday of its own week
    let sunday = date("2024-01-07");
    assert_eq!(scheduled_date_for_slot(sunday, 1, 0), date("2024-01-01"));
}

#[tokio::test]
async fn save_creates_when_the_slot_is_empty() {
    let mut cache = WorkoutCache::new(FakeTransport::default());
    cache.load().await.unwrap();

    let patch = SessionPatch {
        sleep_quality: Patch::Set(4),
        ..SessionPatch::default()
    };

    let saved = cache.save(date("2024-01-03"), 2, 3, patch).await.unwrap();

    assert_eq!(saved.week_number, 2);
    assert_eq!(saved.day_number, 3);
    assert_eq!(saved.scheduled_date, date("2024-01-11"));
    assert_eq!(saved.sleep_quality, Some(4));
    assert!(cache.get(2, 3).is_some());
}

#[tokio::test]
async fn save_updates_when_the_slot_is_occupied() {
    let existing = session_from_new(
        7,
        &NewSession {
            workout_template_id: None,
            scheduled_date: date("2024-01-01"),
            week_number: 1,
            day_number: 0,
            sleep_quality: Some(3),
            energy_level: None,
            notes: None,
            is_completed: None,
            completed_date: None,
        },
    );

    let mut cache = WorkoutCache::new(FakeTransport::with_sessions(vec![existing]));
    cache.load().await.unwrap();

    let patch = SessionPatch {
        is_completed: Patch::Set(true),
        notes: Patch::Set("done".to_string()),
        ..SessionPatch::default()
    };

    let saved = cache.save(date("2024-01-03"), 1, 0, patch).await.unwrap();

    // Same row updated in place, no second session created
    assert_eq!(saved.id, 7);
    assert!(saved.is_completed);
    assert_eq!(saved.sleep_quality, Some(3));

    let cached = cache.get(1, 0).unwrap();
    assert_eq!(cached.notes.as_deref(), Some("done"));
}

#[tokio::test]
async fn delete_clears_the_slot_and_ignores_empty_slots() {
    let existing = session_from_new(
        1,
        &NewSession {
            workout_template_id: None,
            scheduled_date: date("2024-01-01"),
            week_number: 1,
            day_number: 0,
            sleep_quality: None,
            energy_level: None,
            notes: None,
            is_completed: None,
            completed_date: None,
        },
    );

    let transport = FakeTransport::with_sessions(vec![existing]);
    let mut cache = WorkoutCache::new(transport);
    cache.load().await.unwrap();

    cache.delete(1, 0).await.unwrap();
    assert!(cache.get(1, 0).is_none());

    // Deleting an empty slot is a no-op, not an error
    cache.delete(5, 5).await.unwrap();
}

#[tokio::test]
async fn progress_counts_completed_slots_against_the_full_grid() {
    let completed = |id, week, day| {
        session_from_new(
            id,
            &NewSession {
                workout_template_id: None,
                scheduled_date: date("2024-01-01"),
                week_number: week,
                day_number: day,
                sleep_quality: None,
                energy_level: None,
                notes: None,
                is_completed: Some(true),
                completed_date: None,
            },
        )
    };

    let transport = FakeTransport::with_sessions(vec![
        completed(1, 1, 0),
        completed(2, 1, 1),
        session_from_new(
            3,
            &NewSession {
                workout_template_id: None,
                scheduled_date: date("2024-01-03"),
                week_number: 1,
                day_number: 2,
                sleep_quality: None,
                energy_level: None,
                notes: None,
                is_completed: None,
                completed_date: None,
            },
        ),
    ]);

    let mut cache = WorkoutCache::new(transport);
    cache.load().await.unwrap();

    assert_eq!(cache.completed_count(), 2);

    let expected = 2.0 / 84.0 * 100.0;
    assert!((cache.overall_progress() - expected).abs() < 1e-9);
}

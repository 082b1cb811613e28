//! Client-side view of the 12-week calendar: a cache of sessions keyed by
//! (week, day) with upsert-by-slot writes. The transport is injected so the
//! cache logic is independent of how requests reach the API.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};

use crate::models::{NewSession, Patch, SessionFilter, SessionPatch, WorkoutSession};

pub const PROGRAM_WEEKS: i64 = 12;
pub const DAYS_PER_WEEK: i64 = 7;

pub trait WorkoutTransport {
    async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<WorkoutSession>>;
    async fn create_session(&self, new: NewSession) -> Result<WorkoutSession>;
    async fn update_session(&self, id: i64, patch: SessionPatch) -> Result<WorkoutSession>;
    async fn delete_session(&self, id: i64) -> Result<()>;
}

/// Scheduled date for a program slot, anchoring week 1 to the Monday of the
/// current calendar week.
pub fn scheduled_date_for_slot(today: NaiveDate, week: i64, day: i64) -> NaiveDate {
    let monday = today - Days::new(today.weekday().num_days_from_monday() as u64);
    let offset = (week - 1) * DAYS_PER_WEEK + day;

    if offset >= 0 {
        monday + Days::new(offset as u64)
    } else {
        monday - Days::new(offset.unsigned_abs())
    }
}

pub struct WorkoutCache<T> {
    transport: T,
    sessions: HashMap<(i64, i64), WorkoutSession>,
}

impl<T: WorkoutTransport> WorkoutCache<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sessions: HashMap::new(),
        }
    }

    /// Bulk-load every session once. The map is not server-authoritative; it
    /// is rebuilt on each full load and patched after each write.
    pub async fn load(&mut self) -> Result<()> {
        let sessions = self
            .transport
            .list_sessions(SessionFilter {
                limit: Some(100),
                ..SessionFilter::default()
            })
            .await?;

        self.sessions.clear();
        for session in sessions {
            self.sessions
                .insert((session.week_number, session.day_number), session);
        }

        Ok(())
    }

    pub fn get(&self, week: i64, day: i64) -> Option<&WorkoutSession> {
        self.sessions.get(&(week, day))
    }

    /// Upsert by natural key: update when the slot already has a session,
    /// otherwise create one with a scheduled date computed from the slot.
    pub async fn save(
        &mut self,
        today: NaiveDate,
        week: i64,
        day: i64,
        patch: SessionPatch,
    ) -> Result<WorkoutSession> {
        let saved = match self.sessions.get(&(week, day)) {
            Some(existing) => self.transport.update_session(existing.id, patch).await?,
            None => {
                let new = NewSession {
                    workout_template_id: None,
                    scheduled_date: scheduled_date_for_slot(today, week, day),
                    week_number: week,
                    day_number: day,
                    sleep_quality: patch_value(&patch.sleep_quality),
                    energy_level: patch_value(&patch.energy_level),
                    notes: match &patch.notes {
                        Patch::Set(notes) => Some(notes.clone()),
                        _ => None,
                    },
                    is_completed: patch_value(&patch.is_completed),
                    completed_date: patch_value(&patch.completed_date),
                };
                self.transport.create_session(new).await?
            }
        };

        self.sessions.insert((week, day), saved.clone());
        Ok(saved)
    }

    pub async fn delete(&mut self, week: i64, day: i64) -> Result<()> {
        let Some(existing) = self.sessions.get(&(week, day)) else {
            return Ok(());
        };

        self.transport.delete_session(existing.id).await?;
        self.sessions.remove(&(week, day));

        Ok(())
    }

    pub fn completed_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| session.is_completed)
            .count()
    }

    /// Share of the full 12x7 grid that has a completed session, in percent.
    pub fn overall_progress(&self) -> f64 {
        let total = (PROGRAM_WEEKS * DAYS_PER_WEEK) as f64;
        self.completed_count() as f64 / total * 100.0
    }
}

fn patch_value<V: Copy>(patch: &Patch<V>) -> Option<V> {
    match patch {
        Patch::Set(value) => Some(*value),
        _ => None,
    }
}

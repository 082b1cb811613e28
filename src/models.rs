use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field-level merge-patch value. A JSON field that is absent deserializes to
/// `Keep`, an explicit `null` to `Clear`, anything else to `Set`. This keeps
/// "clear this field" and "don't touch it" distinguishable, which a plain
/// `Option<T>` cannot do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Merge against the current value of a nullable column.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Clear => None,
            Patch::Set(value) => Some(value),
        }
    }

    /// Merge against a non-nullable column. `Clear` degrades to `Keep`,
    /// matching COALESCE behavior for columns that cannot hold NULL.
    pub fn set_or(self, current: T) -> T {
        match self {
            Patch::Set(value) => value,
            _ => current,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkoutSession {
    pub id: i64,
    pub workout_template_id: Option<i64>,
    pub scheduled_date: NaiveDate,
    pub completed_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub is_completed: bool,
    pub week_number: i64,
    pub day_number: i64,
    pub sleep_quality: Option<i64>,
    pub energy_level: Option<i64>,
    pub soreness_level: Option<i64>,
    pub notes: Option<String>,
    pub overall_rating: Option<i64>,
    // Denormalized from the optional template
    pub workout_name: Option<String>,
    pub workout_type: Option<String>,
    pub phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbWorkoutSession {
    pub id: i64,
    pub workout_template_id: Option<i64>,
    pub scheduled_date: NaiveDate,
    pub completed_date: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub is_completed: bool,
    pub week_number: i64,
    pub day_number: i64,
    pub sleep_quality: Option<i64>,
    pub energy_level: Option<i64>,
    pub soreness_level: Option<i64>,
    pub notes: Option<String>,
    pub overall_rating: Option<i64>,
    pub workout_name: Option<String>,
    pub workout_type: Option<String>,
    pub phase: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DbWorkoutSession> for WorkoutSession {
    fn from(db: DbWorkoutSession) -> Self {
        Self {
            id: db.id,
            workout_template_id: db.workout_template_id,
            scheduled_date: db.scheduled_date,
            completed_date: db.completed_date.map(to_utc),
            duration_minutes: db.duration_minutes,
            is_completed: db.is_completed,
            week_number: db.week_number,
            day_number: db.day_number,
            sleep_quality: db.sleep_quality,
            energy_level: db.energy_level,
            soreness_level: db.soreness_level,
            notes: db.notes,
            overall_rating: db.overall_rating,
            workout_name: db.workout_name,
            workout_type: db.workout_type,
            phase: db.phase,
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

/// One recorded set within a session, joined with its exercise.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExerciseLog {
    pub id: i64,
    pub exercise_id: i64,
    pub order_index: i64,
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_lbs: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub distance_meters: Option<f64>,
    pub rpe: Option<i64>,
    pub notes: Option<String>,
    pub exercise_name: String,
    pub category: Option<String>,
    pub video_url: Option<String>,
    pub equipment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbExerciseLog {
    pub id: i64,
    pub exercise_id: i64,
    pub order_index: i64,
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_lbs: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub distance_meters: Option<f64>,
    pub rpe: Option<i64>,
    pub notes: Option<String>,
    pub exercise_name: String,
    pub category: Option<String>,
    pub video_url: Option<String>,
    pub equipment: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<DbExerciseLog> for ExerciseLog {
    fn from(db: DbExerciseLog) -> Self {
        Self {
            id: db.id,
            exercise_id: db.exercise_id,
            order_index: db.order_index,
            set_number: db.set_number,
            reps: db.reps,
            weight_lbs: db.weight_lbs,
            duration_seconds: db.duration_seconds,
            distance_meters: db.distance_meters,
            rpe: db.rpe,
            notes: db.notes,
            exercise_name: db.exercise_name,
            category: db.category,
            video_url: db.video_url,
            equipment: db.equipment,
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: WorkoutSession,
    pub exercise_logs: Vec<ExerciseLog>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub equipment: Option<String>,
    pub muscle_groups: Option<String>,
    pub difficulty_level: Option<String>,
    pub video_url: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct WorkoutTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub workout_type: String,
    pub phase: Option<String>,
    pub week_number: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub warm_up: Option<String>,
    pub cool_down: Option<String>,
    pub notes: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct TemplateExercise {
    pub id: i64,
    pub order_index: i64,
    pub sets: Option<i64>,
    pub reps: Option<String>,
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub equipment: Option<String>,
    pub muscle_groups: Option<String>,
    pub video_url: Option<String>,
    pub difficulty_level: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct TemplateDetail {
    #[serde(flatten)]
    pub template: WorkoutTemplate,
    pub exercises: Vec<TemplateExercise>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProgressMeasurement {
    pub id: i64,
    pub measurement_date: NaiveDate,
    pub body_weight_lbs: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub chest_inches: Option<f64>,
    pub waist_inches: Option<f64>,
    pub hips_inches: Option<f64>,
    pub arms_inches: Option<f64>,
    pub thighs_inches: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProgressMeasurement {
    pub id: i64,
    pub measurement_date: NaiveDate,
    pub body_weight_lbs: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub chest_inches: Option<f64>,
    pub waist_inches: Option<f64>,
    pub hips_inches: Option<f64>,
    pub arms_inches: Option<f64>,
    pub thighs_inches: Option<f64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<DbProgressMeasurement> for ProgressMeasurement {
    fn from(db: DbProgressMeasurement) -> Self {
        Self {
            id: db.id,
            measurement_date: db.measurement_date,
            body_weight_lbs: db.body_weight_lbs,
            body_fat_percentage: db.body_fat_percentage,
            chest_inches: db.chest_inches,
            waist_inches: db.waist_inches,
            hips_inches: db.hips_inches,
            arms_inches: db.arms_inches,
            thighs_inches: db.thighs_inches,
            notes: db.notes,
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct UserGoal {
    pub id: i64,
    pub goal_type: String,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: String,
    pub target_date: NaiveDate,
    pub is_achieved: bool,
    pub achieved_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserGoal {
    pub id: i64,
    pub goal_type: String,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: String,
    pub target_date: NaiveDate,
    pub is_achieved: bool,
    pub achieved_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DbUserGoal> for UserGoal {
    fn from(db: DbUserGoal) -> Self {
        Self {
            id: db.id,
            goal_type: db.goal_type,
            target_value: db.target_value,
            current_value: db.current_value,
            unit: db.unit,
            target_date: db.target_date,
            is_achieved: db.is_achieved,
            achieved_date: db.achieved_date.map(to_utc),
            notes: db.notes,
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation / reporting rows
// ---------------------------------------------------------------------------

/// Aggregate over a user's sessions. The averages are `None` when no
/// contributing rows exist; callers must not read that as zero.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct UserStats {
    pub total_workouts: i64,
    pub completed_workouts: i64,
    pub avg_sleep_quality: Option<f64>,
    pub avg_energy_level: Option<f64>,
    pub avg_rating: Option<f64>,
    pub last_workout_date: Option<NaiveDateTime>,
    pub total_minutes: Option<i64>,
    pub unique_exercises: i64,
}

/// Per-week aggregate. Weeks without sessions produce no row.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct WeeklySummaryRow {
    pub week_number: i64,
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub avg_sleep: Option<f64>,
    pub avg_energy: Option<f64>,
    pub avg_rating: Option<f64>,
    pub total_duration: Option<i64>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct WeightRecord {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub max_weight: f64,
    pub reps: Option<i64>,
    pub achieved_date: NaiveDate,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct RepRecord {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub max_reps: i64,
    pub achieved_date: NaiveDate,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct DurationRecord {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub max_duration_seconds: i64,
    pub achieved_date: NaiveDate,
}

/// The three lists are independent; an exercise appears in whichever lists
/// its logged fields qualify it for.
#[derive(Serialize, Debug, Clone)]
pub struct PersonalRecords {
    pub weight_records: Vec<WeightRecord>,
    pub rep_records: Vec<RepRecord>,
    pub duration_records: Vec<DurationRecord>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ExerciseProgressEntry {
    pub id: i64,
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_lbs: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub rpe: Option<i64>,
    pub created_at: NaiveDateTime,
    pub scheduled_date: NaiveDate,
    pub week_number: i64,
    pub exercise_name: String,
}

// ---------------------------------------------------------------------------
// Domain operation inputs
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewSession {
    pub workout_template_id: Option<i64>,
    pub scheduled_date: NaiveDate,
    pub week_number: i64,
    pub day_number: i64,
    pub sleep_quality: Option<i64>,
    pub energy_level: Option<i64>,
    pub notes: Option<String>,
    pub is_completed: Option<bool>,
    pub completed_date: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub completed_date: Patch<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub duration_minutes: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub is_completed: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub sleep_quality: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub energy_level: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub soreness_level: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub overall_rating: Patch<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewExerciseLog {
    pub exercise_id: i64,
    pub order_index: i64,
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_lbs: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub distance_meters: Option<f64>,
    pub rpe: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub week: Option<i64>,
    pub completed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewGoal {
    pub goal_type: String,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: String,
    pub target_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GoalPatch {
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub current_value: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub is_achieved: Patch<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub achieved_date: Patch<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewMeasurement {
    pub measurement_date: NaiveDate,
    pub body_weight_lbs: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub chest_inches: Option<f64>,
    pub waist_inches: Option<f64>,
    pub hips_inches: Option<f64>,
    pub arms_inches: Option<f64>,
    pub thighs_inches: Option<f64>,
    pub notes: Option<String>,
}

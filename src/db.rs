use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{AuthSession, DbAuthSession, DbUser, User};
use crate::error::AppError;
use crate::models::{
    DbExerciseLog, DbProgressMeasurement, DbUserGoal, DbWorkoutSession, DurationRecord, Exercise,
    ExerciseLog, ExerciseProgressEntry, GoalPatch, NewExerciseLog, NewGoal, NewMeasurement,
    NewSession, PersonalRecords, ProgressMeasurement, RepRecord, SessionDetail, SessionFilter,
    SessionPatch, TemplateDetail, TemplateExercise, UserGoal, UserStats, WeeklySummaryRow,
    WeightRecord, WorkoutSession, WorkoutTemplate,
};

const SESSION_COLUMNS: &str = "
    ws.id, ws.workout_template_id, ws.scheduled_date, ws.completed_date,
    ws.duration_minutes, ws.is_completed, ws.week_number, ws.day_number,
    ws.sleep_quality, ws.energy_level, ws.soreness_level, ws.notes,
    ws.overall_rating, ws.created_at, ws.updated_at,
    wt.name AS workout_name, wt.workout_type, wt.phase";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(username, email))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<User, AppError> {
    info!("Creating new user");

    let mut tx = pool.begin().await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Username or email already exists".to_string(),
        ));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, email, password_hash, full_name) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .bind(full_name)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, is_active, last_login, created_at
         FROM users WHERE id = ?",
    )
    .bind(res.last_insert_rowid())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(User::from(row))
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, is_active, last_login, created_at
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct DbCredentials {
        id: i64,
        password_hash: String,
        is_active: bool,
    }

    let row = sqlx::query_as::<_, DbCredentials>(
        "SELECT id, password_hash, is_active FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = row else {
        return Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        ));
    };

    if !credentials.is_active {
        return Err(AppError::Authorization("Account is inactive".to_string()));
    }

    match bcrypt::verify(password, &credentials.password_hash) {
        Ok(true) => get_user(pool, credentials.id).await,
        _ => Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        )),
    }
}

#[instrument]
pub async fn touch_last_login(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Auth sessions
// ---------------------------------------------------------------------------

#[instrument(skip(pool, token))]
pub async fn create_auth_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating auth session");

    let res = sqlx::query("INSERT INTO auth_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_auth_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<AuthSession, AppError> {
    let session = sqlx::query_as::<_, DbAuthSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM auth_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(AuthSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_auth_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating auth session");

    sqlx::query("DELETE FROM auth_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_auth_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[instrument]
pub async fn list_templates(pool: &Pool<Sqlite>) -> Result<Vec<WorkoutTemplate>, AppError> {
    info!("Listing workout templates");
    let rows = sqlx::query_as::<_, WorkoutTemplate>(
        "SELECT id, name, description, workout_type, phase, week_number,
                duration_minutes, warm_up, cool_down, notes
         FROM workout_templates
         ORDER BY week_number, workout_type",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument]
pub async fn get_template(pool: &Pool<Sqlite>, id: i64) -> Result<TemplateDetail, AppError> {
    info!("Fetching workout template");
    let template = sqlx::query_as::<_, WorkoutTemplate>(
        "SELECT id, name, description, workout_type, phase, week_number,
                duration_minutes, warm_up, cool_down, notes
         FROM workout_templates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(template) = template else {
        return Err(AppError::NotFound(format!(
            "Workout template with id {} not found",
            id
        )));
    };

    let exercises = sqlx::query_as::<_, TemplateExercise>(
        "SELECT wte.id, wte.order_index, wte.sets, wte.reps, wte.rest_seconds, wte.notes,
                e.id AS exercise_id, e.name AS exercise_name, e.description, e.category,
                e.equipment, e.muscle_groups, e.video_url, e.difficulty_level
         FROM workout_template_exercises wte
         JOIN exercises e ON wte.exercise_id = e.id
         WHERE wte.workout_template_id = ?
         ORDER BY wte.order_index",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(TemplateDetail {
        template,
        exercises,
    })
}

#[instrument]
pub async fn list_exercises(
    pool: &Pool<Sqlite>,
    category: Option<&str>,
    difficulty: Option<&str>,
) -> Result<Vec<Exercise>, AppError> {
    info!("Listing exercises");

    let mut sql = String::from(
        "SELECT id, name, description, category, equipment, muscle_groups,
                difficulty_level, video_url
         FROM exercises WHERE 1=1",
    );
    if category.is_some() {
        sql.push_str(" AND category = ?");
    }
    if difficulty.is_some() {
        sql.push_str(" AND difficulty_level = ?");
    }
    sql.push_str(" ORDER BY name");

    let mut query = sqlx::query_as::<_, Exercise>(&sql);
    if let Some(category) = category {
        query = query.bind(category.to_string());
    }
    if let Some(difficulty) = difficulty {
        query = query.bind(difficulty.to_string());
    }

    Ok(query.fetch_all(pool).await?)
}

// ---------------------------------------------------------------------------
// Workout sessions
// ---------------------------------------------------------------------------

async fn session_row(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<Option<DbWorkoutSession>, AppError> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS}
         FROM workout_sessions ws
         LEFT JOIN workout_templates wt ON ws.workout_template_id = wt.id
         WHERE ws.id = ? AND ws.user_id = ?"
    );

    let row = sqlx::query_as::<_, DbWorkoutSession>(&sql)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

async fn session_by_slot(
    pool: &Pool<Sqlite>,
    user_id: i64,
    week_number: i64,
    day_number: i64,
) -> Result<Option<WorkoutSession>, AppError> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS}
         FROM workout_sessions ws
         LEFT JOIN workout_templates wt ON ws.workout_template_id = wt.id
         WHERE ws.user_id = ? AND ws.week_number = ? AND ws.day_number = ?"
    );

    let row = sqlx::query_as::<_, DbWorkoutSession>(&sql)
        .bind(user_id)
        .bind(week_number)
        .bind(day_number)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(WorkoutSession::from))
}

#[instrument(skip(pool, new))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new: &NewSession,
) -> Result<WorkoutSession, AppError> {
    info!(
        week = new.week_number,
        day = new.day_number,
        "Creating workout session"
    );

    let res = sqlx::query(
        "INSERT INTO workout_sessions
            (user_id, workout_template_id, scheduled_date, week_number, day_number,
             sleep_quality, energy_level, notes, is_completed, completed_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(new.workout_template_id)
    .bind(new.scheduled_date)
    .bind(new.week_number)
    .bind(new.day_number)
    .bind(new.sleep_quality)
    .bind(new.energy_level)
    .bind(new.notes.as_deref())
    .bind(new.is_completed.unwrap_or(false))
    .bind(new.completed_date)
    .execute(pool)
    .await;

    let res = match res {
        Ok(res) => res,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::Conflict(format!(
                "A session already exists for week {} day {}",
                new.week_number, new.day_number
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let row = session_row(pool, user_id, res.last_insert_rowid())
        .await?
        .ok_or_else(|| AppError::Internal("Created session not found".to_string()))?;

    Ok(WorkoutSession::from(row))
}

#[instrument(skip(pool, new))]
pub async fn ensure_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new: &NewSession,
) -> Result<WorkoutSession, AppError> {
    if let Some(existing) = session_by_slot(pool, user_id, new.week_number, new.day_number).await? {
        return Ok(existing);
    }

    match create_session(pool, user_id, new).await {
        Ok(session) => Ok(session),
        // Lost a create race for the slot; the winner's row is the session.
        Err(AppError::Conflict(_)) => {
            session_by_slot(pool, user_id, new.week_number, new.day_number)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("Session slot conflict without a row".to_string())
                })
        }
        Err(err) => Err(err),
    }
}

#[instrument(skip(pool, filter))]
pub async fn list_sessions(
    pool: &Pool<Sqlite>,
    user_id: i64,
    filter: &SessionFilter,
) -> Result<Vec<WorkoutSession>, AppError> {
    info!("Listing workout sessions");

    let mut sql = format!(
        "SELECT {SESSION_COLUMNS}
         FROM workout_sessions ws
         LEFT JOIN workout_templates wt ON ws.workout_template_id = wt.id
         WHERE ws.user_id = ?"
    );
    if filter.week.is_some() {
        sql.push_str(" AND ws.week_number = ?");
    }
    if filter.completed.is_some() {
        sql.push_str(" AND ws.is_completed = ?");
    }
    sql.push_str(" ORDER BY ws.scheduled_date DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, DbWorkoutSession>(&sql).bind(user_id);
    if let Some(week) = filter.week {
        query = query.bind(week);
    }
    if let Some(completed) = filter.completed {
        query = query.bind(completed);
    }
    query = query
        .bind(filter.limit.unwrap_or(50))
        .bind(filter.offset.unwrap_or(0));

    let rows = query.fetch_all(pool).await?;

    Ok(rows.into_iter().map(WorkoutSession::from).collect())
}

#[instrument]
pub async fn get_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<SessionDetail, AppError> {
    info!("Fetching workout session");

    let Some(row) = session_row(pool, user_id, session_id).await? else {
        return Err(AppError::NotFound(format!(
            "Workout session with id {} not found",
            session_id
        )));
    };

    let logs = sqlx::query_as::<_, DbExerciseLog>(
        "SELECT el.id, el.exercise_id, el.order_index, el.set_number, el.reps,
                el.weight_lbs, el.duration_seconds, el.distance_meters, el.rpe,
                el.notes, el.created_at,
                e.name AS exercise_name, e.category, e.video_url, e.equipment
         FROM exercise_logs el
         JOIN exercises e ON el.exercise_id = e.id
         WHERE el.workout_session_id = ?
         ORDER BY el.order_index, el.set_number",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(SessionDetail {
        session: WorkoutSession::from(row),
        exercise_logs: logs.into_iter().map(ExerciseLog::from).collect(),
    })
}

#[instrument(skip(pool, patch))]
pub async fn update_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
    patch: &SessionPatch,
) -> Result<WorkoutSession, AppError> {
    info!("Updating workout session");

    let Some(current) = session_row(pool, user_id, session_id).await? else {
        return Err(AppError::NotFound(format!(
            "Workout session with id {} not found",
            session_id
        )));
    };

    let patch = patch.clone();
    let completed_date = patch.completed_date.apply(current.completed_date);
    let duration_minutes = patch.duration_minutes.apply(current.duration_minutes);
    let is_completed = patch.is_completed.set_or(current.is_completed);
    let sleep_quality = patch.sleep_quality.apply(current.sleep_quality);
    let energy_level = patch.energy_level.apply(current.energy_level);
    let soreness_level = patch.soreness_level.apply(current.soreness_level);
    let notes = patch.notes.apply(current.notes);
    let overall_rating = patch.overall_rating.apply(current.overall_rating);
    let now = Utc::now().naive_utc();

    sqlx::query(
        "UPDATE workout_sessions
         SET completed_date = ?, duration_minutes = ?, is_completed = ?,
             sleep_quality = ?, energy_level = ?, soreness_level = ?,
             notes = ?, overall_rating = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(completed_date)
    .bind(duration_minutes)
    .bind(is_completed)
    .bind(sleep_quality)
    .bind(energy_level)
    .bind(soreness_level)
    .bind(notes)
    .bind(overall_rating)
    .bind(now)
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    let row = session_row(pool, user_id, session_id)
        .await?
        .ok_or_else(|| AppError::Internal("Updated session not found".to_string()))?;

    Ok(WorkoutSession::from(row))
}

#[instrument]
pub async fn delete_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<(), AppError> {
    info!("Deleting workout session");

    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM exercise_logs
         WHERE workout_session_id IN
             (SELECT id FROM workout_sessions WHERE id = ? AND user_id = ?)",
    )
    .bind(session_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM workout_sessions WHERE id = ? AND user_id = ?")
        .bind(session_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Workout session with id {} not found",
            session_id
        )));
    }

    tx.commit().await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Exercise logs (append-only)
// ---------------------------------------------------------------------------

#[instrument(skip(pool, new))]
pub async fn log_exercise(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
    new: &NewExerciseLog,
) -> Result<ExerciseLog, AppError> {
    info!(exercise_id = new.exercise_id, "Logging exercise set");

    // Ownership check before the insert: logging against someone else's
    // session must look identical to logging against a missing one.
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM workout_sessions WHERE id = ? AND user_id = ?",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if owned.is_none() {
        return Err(AppError::NotFound(format!(
            "Workout session with id {} not found",
            session_id
        )));
    }

    let res = sqlx::query(
        "INSERT INTO exercise_logs
            (workout_session_id, exercise_id, order_index, set_number, reps,
             weight_lbs, duration_seconds, distance_meters, rpe, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(new.exercise_id)
    .bind(new.order_index)
    .bind(new.set_number)
    .bind(new.reps)
    .bind(new.weight_lbs)
    .bind(new.duration_seconds)
    .bind(new.distance_meters)
    .bind(new.rpe)
    .bind(new.notes.as_deref())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, DbExerciseLog>(
        "SELECT el.id, el.exercise_id, el.order_index, el.set_number, el.reps,
                el.weight_lbs, el.duration_seconds, el.distance_meters, el.rpe,
                el.notes, el.created_at,
                e.name AS exercise_name, e.category, e.video_url, e.equipment
         FROM exercise_logs el
         JOIN exercises e ON el.exercise_id = e.id
         WHERE el.id = ?",
    )
    .bind(res.last_insert_rowid())
    .fetch_one(pool)
    .await?;

    Ok(ExerciseLog::from(row))
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[instrument]
pub async fn user_stats(
    pool: &Pool<Sqlite>,
    user_id: i64,
    week_start: Option<i64>,
    week_end: Option<i64>,
) -> Result<UserStats, AppError> {
    info!("Computing user stats");

    // unique_exercises comes from a subquery so the log join cannot fan out
    // the per-session sums and averages.
    let mut session_filter = String::from("ws.user_id = ?");
    if week_start.is_some() {
        session_filter.push_str(" AND ws.week_number >= ?");
    }
    if week_end.is_some() {
        session_filter.push_str(" AND ws.week_number <= ?");
    }

    let sql = format!(
        "SELECT
            COUNT(DISTINCT ws.id) AS total_workouts,
            COUNT(DISTINCT CASE WHEN ws.is_completed = 1 THEN ws.id END) AS completed_workouts,
            AVG(ws.sleep_quality) AS avg_sleep_quality,
            AVG(ws.energy_level) AS avg_energy_level,
            AVG(ws.overall_rating) AS avg_rating,
            MAX(ws.completed_date) AS last_workout_date,
            SUM(ws.duration_minutes) AS total_minutes,
            (SELECT COUNT(DISTINCT el.exercise_id)
             FROM exercise_logs el
             JOIN workout_sessions ws ON el.workout_session_id = ws.id
             WHERE {session_filter}) AS unique_exercises
         FROM workout_sessions ws
         WHERE {session_filter}"
    );

    let mut query = sqlx::query_as::<_, UserStats>(&sql);
    for _ in 0..2 {
        query = query.bind(user_id);
        if let Some(week_start) = week_start {
            query = query.bind(week_start);
        }
        if let Some(week_end) = week_end {
            query = query.bind(week_end);
        }
    }

    Ok(query.fetch_one(pool).await?)
}

#[instrument]
pub async fn weekly_summary(
    pool: &Pool<Sqlite>,
    user_id: i64,
    weeks: i64,
) -> Result<Vec<WeeklySummaryRow>, AppError> {
    info!("Computing weekly summary");

    let rows = sqlx::query_as::<_, WeeklySummaryRow>(
        "SELECT
            ws.week_number,
            COUNT(DISTINCT ws.id) AS total_sessions,
            COUNT(DISTINCT CASE WHEN ws.is_completed = 1 THEN ws.id END) AS completed_sessions,
            AVG(ws.sleep_quality) AS avg_sleep,
            AVG(ws.energy_level) AS avg_energy,
            AVG(ws.overall_rating) AS avg_rating,
            SUM(ws.duration_minutes) AS total_duration
         FROM workout_sessions ws
         WHERE ws.user_id = ? AND ws.week_number <= ?
         GROUP BY ws.week_number
         ORDER BY ws.week_number",
    )
    .bind(user_id)
    .bind(weeks)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument]
pub async fn personal_records(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<PersonalRecords, AppError> {
    info!("Computing personal records");

    // Best row per exercise name, most recent session winning ties.
    let weight_records = sqlx::query_as::<_, WeightRecord>(
        "SELECT exercise_id, exercise_name, max_weight, reps, achieved_date FROM (
            SELECT e.id AS exercise_id, e.name AS exercise_name,
                   el.weight_lbs AS max_weight, el.reps AS reps,
                   ws.scheduled_date AS achieved_date,
                   ROW_NUMBER() OVER (
                       PARTITION BY e.name
                       ORDER BY el.weight_lbs DESC, ws.scheduled_date DESC
                   ) AS rn
            FROM exercise_logs el
            JOIN exercises e ON el.exercise_id = e.id
            JOIN workout_sessions ws ON el.workout_session_id = ws.id
            WHERE ws.user_id = ? AND el.weight_lbs IS NOT NULL AND ws.is_completed = 1
         ) WHERE rn = 1
         ORDER BY exercise_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let rep_records = sqlx::query_as::<_, RepRecord>(
        "SELECT exercise_id, exercise_name, max_reps, achieved_date FROM (
            SELECT e.id AS exercise_id, e.name AS exercise_name,
                   el.reps AS max_reps, ws.scheduled_date AS achieved_date,
                   ROW_NUMBER() OVER (
                       PARTITION BY e.name
                       ORDER BY el.reps DESC, ws.scheduled_date DESC
                   ) AS rn
            FROM exercise_logs el
            JOIN exercises e ON el.exercise_id = e.id
            JOIN workout_sessions ws ON el.workout_session_id = ws.id
            WHERE ws.user_id = ? AND el.reps IS NOT NULL AND ws.is_completed = 1
         ) WHERE rn = 1
         ORDER BY exercise_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let duration_records = sqlx::query_as::<_, DurationRecord>(
        "SELECT exercise_id, exercise_name, max_duration_seconds, achieved_date FROM (
            SELECT e.id AS exercise_id, e.name AS exercise_name,
                   el.duration_seconds AS max_duration_seconds,
                   ws.scheduled_date AS achieved_date,
                   ROW_NUMBER() OVER (
                       PARTITION BY e.name
                       ORDER BY el.duration_seconds DESC, ws.scheduled_date DESC
                   ) AS rn
            FROM exercise_logs el
            JOIN exercises e ON el.exercise_id = e.id
            JOIN workout_sessions ws ON el.workout_session_id = ws.id
            WHERE ws.user_id = ? AND el.duration_seconds IS NOT NULL AND ws.is_completed = 1
         ) WHERE rn = 1
         ORDER BY exercise_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(PersonalRecords {
        weight_records,
        rep_records,
        duration_records,
    })
}

#[instrument]
pub async fn exercise_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    exercise_id: i64,
    limit: i64,
) -> Result<Vec<ExerciseProgressEntry>, AppError> {
    info!("Fetching exercise progress");

    let rows = sqlx::query_as::<_, ExerciseProgressEntry>(
        "SELECT el.id, el.set_number, el.reps, el.weight_lbs, el.duration_seconds,
                el.rpe, el.created_at,
                ws.scheduled_date, ws.week_number,
                e.name AS exercise_name
         FROM exercise_logs el
         JOIN workout_sessions ws ON el.workout_session_id = ws.id
         JOIN exercises e ON el.exercise_id = e.id
         WHERE ws.user_id = ? AND el.exercise_id = ? AND ws.is_completed = 1
         ORDER BY ws.scheduled_date DESC, el.set_number
         LIMIT ?",
    )
    .bind(user_id)
    .bind(exercise_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[instrument(skip(pool, new))]
pub async fn create_goal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new: &NewGoal,
) -> Result<UserGoal, AppError> {
    info!(goal_type = %new.goal_type, "Creating user goal");

    let res = sqlx::query(
        "INSERT INTO user_goals
            (user_id, goal_type, target_value, current_value, unit, target_date, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&new.goal_type)
    .bind(new.target_value)
    .bind(new.current_value)
    .bind(&new.unit)
    .bind(new.target_date)
    .bind(new.notes.as_deref())
    .execute(pool)
    .await?;

    let row = goal_row(pool, user_id, res.last_insert_rowid())
        .await?
        .ok_or_else(|| AppError::Internal("Created goal not found".to_string()))?;

    Ok(UserGoal::from(row))
}

async fn goal_row(
    pool: &Pool<Sqlite>,
    user_id: i64,
    goal_id: i64,
) -> Result<Option<DbUserGoal>, AppError> {
    let row = sqlx::query_as::<_, DbUserGoal>(
        "SELECT id, goal_type, target_value, current_value, unit, target_date,
                is_achieved, achieved_date, notes, created_at, updated_at
         FROM user_goals WHERE id = ? AND user_id = ?",
    )
    .bind(goal_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[instrument]
pub async fn list_goals(
    pool: &Pool<Sqlite>,
    user_id: i64,
    is_achieved: Option<bool>,
) -> Result<Vec<UserGoal>, AppError> {
    info!("Listing user goals");

    let mut sql = String::from(
        "SELECT id, goal_type, target_value, current_value, unit, target_date,
                is_achieved, achieved_date, notes, created_at, updated_at
         FROM user_goals WHERE user_id = ?",
    );
    if is_achieved.is_some() {
        sql.push_str(" AND is_achieved = ?");
    }
    sql.push_str(" ORDER BY target_date, created_at");

    let mut query = sqlx::query_as::<_, DbUserGoal>(&sql).bind(user_id);
    if let Some(is_achieved) = is_achieved {
        query = query.bind(is_achieved);
    }

    let rows = query.fetch_all(pool).await?;

    Ok(rows.into_iter().map(UserGoal::from).collect())
}

#[instrument(skip(pool, patch))]
pub async fn update_goal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    goal_id: i64,
    patch: &GoalPatch,
) -> Result<UserGoal, AppError> {
    info!("Updating user goal");

    let Some(current) = goal_row(pool, user_id, goal_id).await? else {
        return Err(AppError::NotFound(format!(
            "Goal with id {} not found",
            goal_id
        )));
    };

    let patch = patch.clone();
    let current_value = patch.current_value.apply(current.current_value);
    let is_achieved = patch.is_achieved.set_or(current.is_achieved);
    let achieved_date = patch.achieved_date.apply(current.achieved_date);
    let notes = patch.notes.apply(current.notes);
    let now = Utc::now().naive_utc();

    sqlx::query(
        "UPDATE user_goals
         SET current_value = ?, is_achieved = ?, achieved_date = ?, notes = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(current_value)
    .bind(is_achieved)
    .bind(achieved_date)
    .bind(notes)
    .bind(now)
    .bind(goal_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    let row = goal_row(pool, user_id, goal_id)
        .await?
        .ok_or_else(|| AppError::Internal("Updated goal not found".to_string()))?;

    Ok(UserGoal::from(row))
}

// ---------------------------------------------------------------------------
// Measurements (append-only)
// ---------------------------------------------------------------------------

#[instrument(skip(pool, new))]
pub async fn create_measurement(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new: &NewMeasurement,
) -> Result<ProgressMeasurement, AppError> {
    info!("Creating progress measurement");

    let res = sqlx::query(
        "INSERT INTO progress_measurements
            (user_id, measurement_date, body_weight_lbs, body_fat_percentage,
             chest_inches, waist_inches, hips_inches, arms_inches, thighs_inches, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(new.measurement_date)
    .bind(new.body_weight_lbs)
    .bind(new.body_fat_percentage)
    .bind(new.chest_inches)
    .bind(new.waist_inches)
    .bind(new.hips_inches)
    .bind(new.arms_inches)
    .bind(new.thighs_inches)
    .bind(new.notes.as_deref())
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, DbProgressMeasurement>(
        "SELECT id, measurement_date, body_weight_lbs, body_fat_percentage,
                chest_inches, waist_inches, hips_inches, arms_inches, thighs_inches,
                notes, created_at
         FROM progress_measurements WHERE id = ?",
    )
    .bind(res.last_insert_rowid())
    .fetch_one(pool)
    .await?;

    Ok(ProgressMeasurement::from(row))
}

#[instrument]
pub async fn list_measurements(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<ProgressMeasurement>, AppError> {
    info!("Listing progress measurements");

    let rows = sqlx::query_as::<_, DbProgressMeasurement>(
        "SELECT id, measurement_date, body_weight_lbs, body_fat_percentage,
                chest_inches, waist_inches, hips_inches, arms_inches, thighs_inches,
                notes, created_at
         FROM progress_measurements
         WHERE user_id = ?
         ORDER BY measurement_date DESC
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ProgressMeasurement::from).collect())
}

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rocket::FromForm;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{AuthSession, CurrentUser, User};
use crate::db::{
    authenticate_user, create_auth_session, create_goal, create_measurement, create_session,
    create_user, delete_session, ensure_session, exercise_progress, get_session, get_template,
    get_user, invalidate_auth_session, list_exercises, list_goals, list_measurements,
    list_sessions, list_templates, log_exercise, personal_records, touch_last_login, update_goal,
    update_session, user_stats, weekly_summary,
};
use crate::error::AppError;
use crate::models::{
    Exercise, ExerciseLog, ExerciseProgressEntry, GoalPatch, NewExerciseLog, NewGoal,
    NewMeasurement, NewSession, PersonalRecords, ProgressMeasurement, SessionDetail,
    SessionFilter, SessionPatch, TemplateDetail, UserGoal, UserStats, WeeklySummaryRow,
    WorkoutSession, WorkoutTemplate,
};
use crate::validation::{USERNAME_RE, ValidateExt, require};

const SESSION_TOKEN_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32), regex(path = *USERNAME_RE))]
    username: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 8))]
    password: Option<String>,
    full_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

async fn open_session(
    db: &Pool<Sqlite>,
    cookies: &rocket::http::CookieJar<'_>,
    user: &User,
) -> Result<String, AppError> {
    use rocket::http::{Cookie, SameSite};

    let token = AuthSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_TOKEN_HOURS);

    create_auth_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build(("session_token", token.clone()))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(SESSION_TOKEN_HOURS)),
    );

    Ok(token)
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AuthResponse>, AppError> {
    let login = login.into_inner();
    let username = require(login.username, "username")?;
    let password = require(login.password, "password")?;

    let user = authenticate_user(db, &username, &password).await?;
    let token = open_session(db, cookies, &user).await?;
    touch_last_login(db, user.id).await?;

    Ok(Json(AuthResponse { token, user }))
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<AuthResponse>>, AppError> {
    registration.validate_request()?;

    let registration = registration.into_inner();
    let username = require(registration.username, "username")?;
    let email = require(registration.email, "email")?;
    let password = require(registration.password, "password")?;

    let user = create_user(
        db,
        &username,
        &email,
        &password,
        registration.full_name.as_deref(),
    )
    .await?;

    let token = open_session(db, cookies, &user).await?;

    Ok(Custom(Status::Created, Json(AuthResponse { token, user })))
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Json<serde_json::Value> {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_auth_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));

    Json(serde_json::json!({ "message": "Logged out" }))
}

#[get("/profile")]
pub async fn api_profile(
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<User>, AppError> {
    let user = get_user(db, user.id).await?;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[get("/templates")]
pub async fn api_list_templates(
    _user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<WorkoutTemplate>>, AppError> {
    let templates = list_templates(db).await?;
    Ok(Json(templates))
}

#[get("/templates/<id>")]
pub async fn api_get_template(
    id: i64,
    _user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TemplateDetail>, AppError> {
    let template = get_template(db, id).await?;
    Ok(Json(template))
}

#[derive(FromForm)]
pub struct ExercisesQueryParams {
    category: Option<String>,
    difficulty: Option<String>,
}

#[get("/exercises?<params..>")]
pub async fn api_list_exercises(
    params: ExercisesQueryParams,
    _user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Exercise>>, AppError> {
    let exercises =
        list_exercises(db, params.category.as_deref(), params.difficulty.as_deref()).await?;
    Ok(Json(exercises))
}

// ---------------------------------------------------------------------------
// Workout sessions
// ---------------------------------------------------------------------------

#[derive(FromForm)]
pub struct SessionsQueryParams {
    week: Option<i64>,
    completed: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[get("/sessions?<params..>")]
pub async fn api_list_sessions(
    params: SessionsQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<WorkoutSession>>, AppError> {
    let filter = SessionFilter {
        week: params.week,
        completed: params.completed,
        limit: params.limit,
        offset: params.offset,
    };

    let sessions = list_sessions(db, user.id, &filter).await?;
    Ok(Json(sessions))
}

#[get("/sessions/<id>")]
pub async fn api_get_session(
    id: i64,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SessionDetail>, AppError> {
    let session = get_session(db, user.id, id).await?;
    Ok(Json(session))
}

#[derive(Deserialize, Validate)]
pub struct CreateSessionRequest {
    workout_template_id: Option<i64>,
    scheduled_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 12))]
    week_number: Option<i64>,
    #[validate(range(min = 0, max = 6))]
    day_number: Option<i64>,
    sleep_quality: Option<i64>,
    energy_level: Option<i64>,
    notes: Option<String>,
    is_completed: Option<bool>,
    completed_date: Option<NaiveDateTime>,
}

impl CreateSessionRequest {
    fn into_new_session(self) -> Result<NewSession, AppError> {
        Ok(NewSession {
            workout_template_id: self.workout_template_id,
            scheduled_date: require(self.scheduled_date, "scheduled_date")?,
            week_number: require(self.week_number, "week_number")?,
            day_number: require(self.day_number, "day_number")?,
            sleep_quality: self.sleep_quality,
            energy_level: self.energy_level,
            notes: self.notes,
            is_completed: self.is_completed,
            completed_date: self.completed_date,
        })
    }
}

#[post("/sessions", data = "<session>")]
pub async fn api_create_session(
    session: Json<CreateSessionRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<WorkoutSession>>, AppError> {
    session.validate_request()?;
    let new = session.into_inner().into_new_session()?;

    let created = create_session(db, user.id, &new).await?;
    Ok(Custom(Status::Created, Json(created)))
}

// Idempotent create for a (week, day) program slot: returns the existing
// session when the slot is already occupied.
#[post("/sessions/ensure", data = "<session>")]
pub async fn api_ensure_session(
    session: Json<CreateSessionRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<WorkoutSession>, AppError> {
    session.validate_request()?;
    let new = session.into_inner().into_new_session()?;

    let ensured = ensure_session(db, user.id, &new).await?;
    Ok(Json(ensured))
}

#[put("/sessions/<id>", data = "<patch>")]
pub async fn api_update_session(
    id: i64,
    patch: Json<SessionPatch>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<WorkoutSession>, AppError> {
    let updated = update_session(db, user.id, id, &patch).await?;
    Ok(Json(updated))
}

#[delete("/sessions/<id>")]
pub async fn api_delete_session(
    id: i64,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<serde_json::Value>, AppError> {
    delete_session(db, user.id, id).await?;
    Ok(Json(
        serde_json::json!({ "message": "Workout session deleted successfully" }),
    ))
}

#[derive(Deserialize, Validate)]
pub struct LogExerciseRequest {
    exercise_id: Option<i64>,
    order_index: Option<i64>,
    set_number: Option<i64>,
    reps: Option<i64>,
    weight_lbs: Option<f64>,
    duration_seconds: Option<i64>,
    distance_meters: Option<f64>,
    #[validate(range(min = 1, max = 10))]
    rpe: Option<i64>,
    notes: Option<String>,
}

#[post("/sessions/<session_id>/exercises", data = "<log>")]
pub async fn api_log_exercise(
    session_id: i64,
    log: Json<LogExerciseRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ExerciseLog>>, AppError> {
    log.validate_request()?;
    let log = log.into_inner();

    let new = NewExerciseLog {
        exercise_id: require(log.exercise_id, "exercise_id")?,
        order_index: require(log.order_index, "order_index")?,
        set_number: require(log.set_number, "set_number")?,
        reps: log.reps,
        weight_lbs: log.weight_lbs,
        duration_seconds: log.duration_seconds,
        distance_meters: log.distance_meters,
        rpe: log.rpe,
        notes: log.notes,
    };

    let created = log_exercise(db, user.id, session_id, &new).await?;
    Ok(Custom(Status::Created, Json(created)))
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[derive(FromForm)]
pub struct StatsQueryParams {
    week_start: Option<i64>,
    week_end: Option<i64>,
}

#[get("/stats?<params..>")]
pub async fn api_user_stats(
    params: StatsQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserStats>, AppError> {
    let stats = user_stats(db, user.id, params.week_start, params.week_end).await?;
    Ok(Json(stats))
}

#[derive(FromForm)]
pub struct WeeklyQueryParams {
    weeks: Option<i64>,
}

#[get("/weekly?<params..>")]
pub async fn api_weekly_summary(
    params: WeeklyQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<WeeklySummaryRow>>, AppError> {
    let summary = weekly_summary(db, user.id, params.weeks.unwrap_or(12)).await?;
    Ok(Json(summary))
}

#[get("/records")]
pub async fn api_personal_records(
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PersonalRecords>, AppError> {
    let records = personal_records(db, user.id).await?;
    Ok(Json(records))
}

#[derive(FromForm)]
pub struct ProgressQueryParams {
    limit: Option<i64>,
}

#[get("/exercises/<exercise_id>?<params..>")]
pub async fn api_exercise_progress(
    exercise_id: i64,
    params: ProgressQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ExerciseProgressEntry>>, AppError> {
    let entries =
        exercise_progress(db, user.id, exercise_id, params.limit.unwrap_or(20)).await?;
    Ok(Json(entries))
}

// ---------------------------------------------------------------------------
// Measurements & goals
// ---------------------------------------------------------------------------

#[derive(FromForm)]
pub struct MeasurementsQueryParams {
    limit: Option<i64>,
}

#[get("/measurements?<params..>")]
pub async fn api_list_measurements(
    params: MeasurementsQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<ProgressMeasurement>>, AppError> {
    let measurements = list_measurements(db, user.id, params.limit.unwrap_or(12)).await?;
    Ok(Json(measurements))
}

#[derive(Deserialize)]
pub struct CreateMeasurementRequest {
    measurement_date: Option<NaiveDate>,
    body_weight_lbs: Option<f64>,
    body_fat_percentage: Option<f64>,
    chest_inches: Option<f64>,
    waist_inches: Option<f64>,
    hips_inches: Option<f64>,
    arms_inches: Option<f64>,
    thighs_inches: Option<f64>,
    notes: Option<String>,
}

#[post("/measurements", data = "<measurement>")]
pub async fn api_create_measurement(
    measurement: Json<CreateMeasurementRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ProgressMeasurement>>, AppError> {
    let measurement = measurement.into_inner();

    let new = NewMeasurement {
        measurement_date: require(measurement.measurement_date, "measurement_date")?,
        body_weight_lbs: measurement.body_weight_lbs,
        body_fat_percentage: measurement.body_fat_percentage,
        chest_inches: measurement.chest_inches,
        waist_inches: measurement.waist_inches,
        hips_inches: measurement.hips_inches,
        arms_inches: measurement.arms_inches,
        thighs_inches: measurement.thighs_inches,
        notes: measurement.notes,
    };

    let created = create_measurement(db, user.id, &new).await?;
    Ok(Custom(Status::Created, Json(created)))
}

#[derive(FromForm)]
pub struct GoalsQueryParams {
    is_achieved: Option<bool>,
}

#[get("/goals?<params..>")]
pub async fn api_list_goals(
    params: GoalsQueryParams,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserGoal>>, AppError> {
    let goals = list_goals(db, user.id, params.is_achieved).await?;
    Ok(Json(goals))
}

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    goal_type: Option<String>,
    target_value: Option<f64>,
    current_value: Option<f64>,
    unit: Option<String>,
    target_date: Option<NaiveDate>,
    notes: Option<String>,
}

#[post("/goals", data = "<goal>")]
pub async fn api_create_goal(
    goal: Json<CreateGoalRequest>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<UserGoal>>, AppError> {
    let goal = goal.into_inner();

    let new = NewGoal {
        goal_type: require(goal.goal_type, "goal_type")?,
        target_value: require(goal.target_value, "target_value")?,
        current_value: goal.current_value,
        unit: require(goal.unit, "unit")?,
        target_date: require(goal.target_date, "target_date")?,
        notes: goal.notes,
    };

    let created = create_goal(db, user.id, &new).await?;
    Ok(Custom(Status::Created, Json(created)))
}

#[put("/goals/<id>", data = "<patch>")]
pub async fn api_update_goal(
    id: i64,
    patch: Json<GoalPatch>,
    user: CurrentUser,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserGoal>, AppError> {
    let updated = update_goal(db, user.id, id, &patch).await?;
    Ok(Json(updated))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

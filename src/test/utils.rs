use std::collections::HashMap;
use std::sync::Once;

use chrono::NaiveDate;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::db::{create_session, create_user, log_exercise};
use crate::error::AppError;
use crate::models::{NewExerciseLog, NewSession};

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    exercises: Vec<TestExercise>,
    sessions: Vec<TestSession>,
    logs: Vec<TestLog>,
}

pub struct TestUser {
    pub username: String,
    pub active: bool,
}

pub struct TestExercise {
    pub name: String,
    pub category: String,
}

pub struct TestSession {
    pub username: String,
    pub week: i64,
    pub day: i64,
    pub scheduled_date: String,
    pub is_completed: bool,
    pub sleep_quality: Option<i64>,
    pub energy_level: Option<i64>,
}

pub struct TestLog {
    pub username: String,
    pub week: i64,
    pub day: i64,
    pub exercise: String,
    pub set_number: i64,
    pub reps: Option<i64>,
    pub weight_lbs: Option<f64>,
    pub duration_seconds: Option<i64>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, username: &str) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            active: true,
        });
        self
    }

    pub fn inactive_user(mut self, username: &str) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            active: false,
        });
        self
    }

    pub fn exercise(mut self, name: &str, category: &str) -> Self {
        self.exercises.push(TestExercise {
            name: name.to_string(),
            category: category.to_string(),
        });
        self
    }

    pub fn session(mut self, username: &str, week: i64, day: i64, scheduled_date: &str) -> Self {
        self.sessions.push(TestSession {
            username: username.to_string(),
            week,
            day,
            scheduled_date: scheduled_date.to_string(),
            is_completed: false,
            sleep_quality: None,
            energy_level: None,
        });
        self
    }

    pub fn completed_session(
        mut self,
        username: &str,
        week: i64,
        day: i64,
        scheduled_date: &str,
    ) -> Self {
        self.sessions.push(TestSession {
            username: username.to_string(),
            week,
            day,
            scheduled_date: scheduled_date.to_string(),
            is_completed: true,
            sleep_quality: None,
            energy_level: None,
        });
        self
    }

    pub fn rated_session(
        mut self,
        username: &str,
        week: i64,
        day: i64,
        scheduled_date: &str,
        sleep_quality: i64,
        energy_level: i64,
    ) -> Self {
        self.sessions.push(TestSession {
            username: username.to_string(),
            week,
            day,
            scheduled_date: scheduled_date.to_string(),
            is_completed: false,
            sleep_quality: Some(sleep_quality),
            energy_level: Some(energy_level),
        });
        self
    }

    pub fn weight_log(
        self,
        username: &str,
        week: i64,
        day: i64,
        exercise: &str,
        set_number: i64,
        reps: i64,
        weight_lbs: f64,
    ) -> Self {
        self.log(username, week, day, exercise, set_number, Some(reps), Some(weight_lbs), None)
    }

    pub fn rep_log(
        self,
        username: &str,
        week: i64,
        day: i64,
        exercise: &str,
        set_number: i64,
        reps: i64,
    ) -> Self {
        self.log(username, week, day, exercise, set_number, Some(reps), None, None)
    }

    pub fn duration_log(
        self,
        username: &str,
        week: i64,
        day: i64,
        exercise: &str,
        set_number: i64,
        duration_seconds: i64,
    ) -> Self {
        self.log(username, week, day, exercise, set_number, None, None, Some(duration_seconds))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log(
        mut self,
        username: &str,
        week: i64,
        day: i64,
        exercise: &str,
        set_number: i64,
        reps: Option<i64>,
        weight_lbs: Option<f64>,
        duration_seconds: Option<i64>,
    ) -> Self {
        self.logs.push(TestLog {
            username: username.to_string(),
            week,
            day,
            exercise: exercise.to_string(),
            set_number,
            reps,
            weight_lbs,
            duration_seconds,
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });

        // One connection so the in-memory database is shared by every query.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut exercise_id_map: HashMap<String, i64> = HashMap::new();
        let mut session_id_map: HashMap<(String, i64, i64), i64> = HashMap::new();

        for user in &self.users {
            let email = format!("{}@example.com", user.username);
            let created =
                create_user(&pool, &user.username, &email, STANDARD_PASSWORD, None).await?;

            if !user.active {
                sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
                    .bind(created.id)
                    .execute(&pool)
                    .await?;
            }

            user_id_map.insert(user.username.clone(), created.id);
        }

        for exercise in &self.exercises {
            let res = sqlx::query("INSERT INTO exercises (name, category) VALUES (?, ?)")
                .bind(&exercise.name)
                .bind(&exercise.category)
                .execute(&pool)
                .await?;

            exercise_id_map.insert(exercise.name.clone(), res.last_insert_rowid());
        }

        for session in &self.sessions {
            let user_id = user_id_map[&session.username];
            let scheduled_date: NaiveDate = session
                .scheduled_date
                .parse()
                .expect("Invalid scheduled date in test fixture");

            let created = create_session(
                &pool,
                user_id,
                &NewSession {
                    workout_template_id: None,
                    scheduled_date,
                    week_number: session.week,
                    day_number: session.day,
                    sleep_quality: session.sleep_quality,
                    energy_level: session.energy_level,
                    notes: None,
                    is_completed: Some(session.is_completed),
                    completed_date: None,
                },
            )
            .await?;

            session_id_map.insert(
                (session.username.clone(), session.week, session.day),
                created.id,
            );
        }

        for log in &self.logs {
            let user_id = user_id_map[&log.username];
            let session_id = session_id_map[&(log.username.clone(), log.week, log.day)];
            let exercise_id = exercise_id_map[&log.exercise];

            log_exercise(
                &pool,
                user_id,
                session_id,
                &NewExerciseLog {
                    exercise_id,
                    order_index: log.set_number,
                    set_number: log.set_number,
                    reps: log.reps,
                    weight_lbs: log.weight_lbs,
                    duration_seconds: log.duration_seconds,
                    distance_meters: None,
                    rpe: None,
                    notes: None,
                },
            )
            .await?;
        }

        Ok(TestDb {
            pool,
            user_id_map,
            exercise_id_map,
            session_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub exercise_id_map: HashMap<String, i64>,
    pub session_id_map: HashMap<(String, i64, i64), i64>,
}

impl TestDb {
    pub fn user_id(&self, username: &str) -> i64 {
        self.user_id_map[username]
    }

    pub fn exercise_id(&self, name: &str) -> i64 {
        self.exercise_id_map[name]
    }

    pub fn session_id(&self, username: &str, week: i64, day: i64) -> i64 {
        self.session_id_map[&(username.to_string(), week, day)]
    }

    pub async fn exercise_log_count(&self, session_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM exercise_logs WHERE workout_session_id = ?",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to count exercise logs")
    }
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = crate::init_rocket(test_db.pool.clone()).await;
    let client = Client::tracked(rocket)
        .await
        .expect("Failed to build test client");

    (client, test_db)
}

pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post("/auth/login")
        .header(ContentType::JSON)
        .body(
            json!({
                "username": username,
                "password": password
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let body = response.into_string().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();

    value["token"].as_str().expect("Token missing").to_string()
}

pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod client;
pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod test;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::info;

use api::{
    api_create_goal, api_create_measurement, api_create_session, api_delete_session,
    api_ensure_session, api_exercise_progress, api_get_session, api_get_template,
    api_list_exercises, api_list_goals, api_list_measurements, api_list_sessions,
    api_list_templates, api_log_exercise, api_login, api_logout, api_personal_records,
    api_profile, api_register, api_update_goal, api_update_session, api_user_stats,
    api_weekly_summary, health,
};
use auth::unauthorized_api;
use telemetry::TelemetryFairing;

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting workout calendar server");

    rocket::build()
        .manage(pool)
        .mount(
            "/auth",
            routes![api_login, api_register, api_logout, api_profile],
        )
        .mount(
            "/workouts",
            routes![
                api_list_templates,
                api_get_template,
                api_list_exercises,
                api_list_sessions,
                api_get_session,
                api_create_session,
                api_ensure_session,
                api_update_session,
                api_delete_session,
                api_log_exercise,
            ],
        )
        .mount(
            "/progress",
            routes![
                api_user_stats,
                api_weekly_summary,
                api_personal_records,
                api_exercise_progress,
                api_list_measurements,
                api_create_measurement,
                api_list_goals,
                api_create_goal,
                api_update_goal,
            ],
        )
        .mount("/", routes![health])
        .register("/", catchers![unauthorized_api])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async {
                telemetry::shutdown_telemetry();
            })
        }))
}

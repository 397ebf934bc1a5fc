mod analytics;
mod app;
mod config;
mod error;
mod feedback;
mod identity;
mod notify;
mod points;
mod reservations;
mod retry;
mod schedules;
mod state;
mod storage;
mod waste;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mealmate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    tracing::info!(
        backend = ?app_state.config.store_backend,
        analytics = ?app_state.config.analytics_mode,
        cancel_releases_capacity = app_state.config.cancellation.release_capacity,
        cancel_retracts_points = app_state.config.cancellation.retract_points,
        "state ready"
    );
    notify::spawn_log_subscriber(&app_state.notifier);

    app::serve(app::build_app(app_state)).await
}

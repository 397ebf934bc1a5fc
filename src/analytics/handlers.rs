use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{DashboardQuery, LeaderboardQuery, MealStatsQuery, WasteTrendQuery},
    services,
    views::{Dashboard, LeaderboardEntry, MealStats, WasteTrendDay},
};
use crate::{error::CoreError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/meal-stats", get(meal_stats))
        .route("/analytics/waste-trend", get(waste_trend))
        .route("/analytics/leaderboard", get(leaderboard))
        .route("/analytics/dashboard", get(dashboard))
}

#[instrument(skip(state))]
pub async fn meal_stats(
    State(state): State<AppState>,
    Query(q): Query<MealStatsQuery>,
) -> Result<Json<Vec<MealStats>>, CoreError> {
    Ok(Json(services::meal_stats(&state, q.start, q.end).await?))
}

#[instrument(skip(state))]
pub async fn waste_trend(
    State(state): State<AppState>,
    Query(q): Query<WasteTrendQuery>,
) -> Result<Json<Vec<WasteTrendDay>>, CoreError> {
    let today = q.today.unwrap_or_else(|| OffsetDateTime::now_utc().date());
    Ok(Json(services::waste_trend(&state, q.days, today).await?))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, CoreError> {
    Ok(Json(services::leaderboard(&state, q.limit).await?))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<Dashboard>, CoreError> {
    let today = q.today.unwrap_or_else(|| OffsetDateTime::now_utc().date());
    Ok(Json(services::dashboard(&state, today).await?))
}

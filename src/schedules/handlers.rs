use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateScheduleRequest, DateRange, ScheduleStats},
    repo_types::ScheduledMeal,
    services,
};
use crate::{error::CoreError, identity::Principal, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(list_schedules))
        .route("/schedules/:id", get(get_schedule))
        .route("/schedules/:id/stats", get(schedule_stats))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/schedules", post(create_schedule))
        .route("/schedules/:id/deactivate", post(deactivate_schedule))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id, role = ?principal.role))]
pub async fn create_schedule(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduledMeal>), CoreError> {
    let schedule =
        services::create_schedule(&state, body.into(), OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

#[instrument(skip(state))]
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<ScheduledMeal>>, CoreError> {
    let schedules = services::list_schedules(&state, range.start, range.end).await?;
    Ok(Json(schedules))
}

#[instrument(skip(state))]
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledMeal>, CoreError> {
    Ok(Json(services::get_schedule(&state, id).await?))
}

#[instrument(skip(state), fields(user_id = %principal.user_id, role = ?principal.role))]
pub async fn deactivate_schedule(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledMeal>, CoreError> {
    Ok(Json(services::deactivate_schedule(&state, id).await?))
}

#[instrument(skip(state))]
pub async fn schedule_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduleStats>, CoreError> {
    Ok(Json(services::schedule_stats(&state, id).await?))
}

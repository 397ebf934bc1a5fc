use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{LogWasteRequest, WasteFilter},
    repo_types::WasteEntry,
    services,
};
use crate::{error::CoreError, identity::Principal, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/waste", get(list_waste).post(log_waste))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id, role = ?principal.role))]
pub async fn log_waste(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<LogWasteRequest>,
) -> Result<(StatusCode, Json<WasteEntry>), CoreError> {
    let entry =
        services::log_waste(&state, principal.user_id, body, OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state))]
pub async fn list_waste(
    State(state): State<AppState>,
    Query(filter): Query<WasteFilter>,
) -> Result<Json<Vec<WasteEntry>>, CoreError> {
    Ok(Json(
        services::list_waste(&state, filter.scheduled_meal_id).await?,
    ))
}

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::services;
use crate::{
    error::CoreError,
    identity::{Principal, Role},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/me/points", get(my_points))
}

#[derive(Debug, Serialize)]
pub struct PointsResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub eco_points: i64,
}

#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn my_points(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<PointsResponse>, CoreError> {
    let eco_points = services::balance(&state, principal.user_id).await?;
    Ok(Json(PointsResponse {
        user_id: principal.user_id,
        role: principal.role,
        eco_points,
    }))
}

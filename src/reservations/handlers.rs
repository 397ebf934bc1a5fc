use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ChangePortionRequest, CreateReservationRequest, SettleRequest},
    repo_types::Reservation,
    services,
};
use crate::{error::CoreError, identity::Principal, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations))
        .route("/reservations/:id", get(get_reservation))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/:id/portion", put(change_portion))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        .route("/reservations/:id/settle", post(settle_reservation))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id))]
pub async fn create_reservation(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), CoreError> {
    let reservation = services::create_reservation(
        &state,
        principal.user_id,
        body.scheduled_meal_id,
        body.portion_size,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn list_reservations(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Reservation>>, CoreError> {
    Ok(Json(
        services::list_reservations(&state, principal.user_id).await?,
    ))
}

#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn get_reservation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, CoreError> {
    Ok(Json(
        services::get_reservation(&state, principal.user_id, id).await?,
    ))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id))]
pub async fn change_portion(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangePortionRequest>,
) -> Result<Json<Reservation>, CoreError> {
    let reservation = services::change_portion(
        &state,
        principal.user_id,
        id,
        body.portion_size,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(reservation))
}

#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, CoreError> {
    let reservation =
        services::cancel_reservation(&state, principal.user_id, id, OffsetDateTime::now_utc())
            .await?;
    Ok(Json(reservation))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id, role = ?principal.role))]
pub async fn settle_reservation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(body): Json<SettleRequest>,
) -> Result<Json<Reservation>, CoreError> {
    let reservation =
        services::settle_reservation(&state, id, body.status, OffsetDateTime::now_utc()).await?;
    Ok(Json(reservation))
}

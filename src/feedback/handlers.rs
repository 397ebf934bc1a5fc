use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{RecentQuery, SubmitFeedbackRequest},
    repo_types::{FeedbackEntry, FeedbackFilter},
    services,
};
use crate::{error::CoreError, identity::Principal, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", get(my_feedback).post(submit_feedback))
        .route("/feedback/recent", get(recent_feedback))
        .route("/meals/:id/feedback", get(meal_feedback))
}

#[instrument(skip(state, body), fields(user_id = %principal.user_id))]
pub async fn submit_feedback(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackEntry>), CoreError> {
    let entry =
        services::submit_feedback(&state, principal.user_id, body, OffsetDateTime::now_utc())
            .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn my_feedback(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<FeedbackEntry>>, CoreError> {
    let entries =
        services::list_feedback(&state, FeedbackFilter::ByUser(principal.user_id)).await?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn recent_feedback(
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<FeedbackEntry>>, CoreError> {
    let entries = services::list_feedback(&state, FeedbackFilter::Recent(q.limit)).await?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn meal_feedback(
    State(state): State<AppState>,
    Path(meal_id): Path<Uuid>,
) -> Result<Json<Vec<FeedbackEntry>>, CoreError> {
    let entries = services::list_feedback(&state, FeedbackFilter::ByMeal(meal_id)).await?;
    Ok(Json(entries))
}

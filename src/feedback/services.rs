use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::SubmitFeedbackRequest,
    repo_types::{FeedbackEntry, FeedbackFilter, NewFeedback},
};
use crate::{
    error::CoreError,
    notify::{ChangeNotification, EntityKind},
    retry::with_retry,
    state::AppState,
};

pub const MAX_RECENT: i64 = 100;

#[instrument(skip(state, req, now), fields(meal_id = %req.meal_id, rating = req.rating))]
pub async fn submit_feedback(
    state: &AppState,
    user_id: Uuid,
    req: SubmitFeedbackRequest,
    now: OffsetDateTime,
) -> Result<FeedbackEntry, CoreError> {
    if !(1..=5).contains(&req.rating) {
        return Err(CoreError::InvalidInput("rating must be between 1 and 5".into()));
    }
    let new = NewFeedback {
        user_id,
        meal_id: req.meal_id,
        scheduled_meal_id: req.scheduled_meal_id,
        rating: req.rating,
        reasons: req
            .reasons
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect(),
        comment: req.comment.filter(|c| !c.trim().is_empty()),
        created_at: now,
    };
    let entry = with_retry(state.config.retry, "append_feedback", || {
        state.store.append_feedback(new.clone())
    })
    .await?;
    info!(feedback_id = %entry.id, points = entry.points_earned, "feedback submitted");
    state
        .notifier
        .publish(ChangeNotification::created(EntityKind::Feedback, entry.id));
    state
        .notifier
        .publish(ChangeNotification::updated(EntityKind::Points, user_id));
    Ok(entry)
}

pub async fn list_feedback(
    state: &AppState,
    filter: FeedbackFilter,
) -> Result<Vec<FeedbackEntry>, CoreError> {
    let filter = match filter {
        FeedbackFilter::Recent(limit) => FeedbackFilter::Recent(limit.clamp(1, MAX_RECENT)),
        other => other,
    };
    state.store.list_feedback(filter).await
}

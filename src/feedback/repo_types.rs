use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A user's rating of a meal. Append-only; several per (user, meal) are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_id: Uuid,
    pub scheduled_meal_id: Option<Uuid>,
    pub rating: i16,
    pub reasons: Vec<String>,
    pub comment: Option<String>,
    pub points_earned: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: Uuid,
    pub meal_id: Uuid,
    pub scheduled_meal_id: Option<Uuid>,
    pub rating: i16,
    pub reasons: Vec<String>,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
}

impl NewFeedback {
    pub fn into_record(self, points_earned: i32) -> FeedbackEntry {
        FeedbackEntry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            meal_id: self.meal_id,
            scheduled_meal_id: self.scheduled_meal_id,
            rating: self.rating,
            reasons: self.reasons,
            comment: self.comment,
            points_earned,
            created_at: self.created_at,
        }
    }
}

/// Which feedback entries a listing returns, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackFilter {
    ByUser(Uuid),
    ByMeal(Uuid),
    Recent(i64),
}

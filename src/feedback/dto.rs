use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub meal_id: Uuid,
    pub scheduled_meal_id: Option<Uuid>,
    pub rating: i16,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub comment: Option<String>,
}

/// Entries shown by the recent feedback feed when no limit is given.
pub const DEFAULT_RECENT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_RECENT
}

use sqlx::PgExecutor;

use super::repo_types::{FeedbackEntry, FeedbackFilter};
use crate::error::CoreError;

const COLUMNS: &str = "id, user_id, meal_id, scheduled_meal_id, rating, reasons, \
    comment, points_earned, created_at";

pub async fn insert(
    db: impl PgExecutor<'_>,
    f: &FeedbackEntry,
) -> Result<FeedbackEntry, CoreError> {
    let sql = format!(
        "INSERT INTO feedback_entries ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, FeedbackEntry>(&sql)
        .bind(f.id)
        .bind(f.user_id)
        .bind(f.meal_id)
        .bind(f.scheduled_meal_id)
        .bind(f.rating)
        .bind(&f.reasons)
        .bind(&f.comment)
        .bind(f.points_earned)
        .bind(f.created_at)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn list(
    db: impl PgExecutor<'_>,
    filter: FeedbackFilter,
) -> Result<Vec<FeedbackEntry>, CoreError> {
    let base = format!("SELECT {COLUMNS} FROM feedback_entries");
    let rows = match filter {
        FeedbackFilter::ByUser(user_id) => {
            let sql = format!("{base} WHERE user_id = $1 ORDER BY created_at DESC, id");
            sqlx::query_as::<_, FeedbackEntry>(&sql)
                .bind(user_id)
                .fetch_all(db)
                .await?
        }
        FeedbackFilter::ByMeal(meal_id) => {
            let sql = format!("{base} WHERE meal_id = $1 ORDER BY created_at DESC, id");
            sqlx::query_as::<_, FeedbackEntry>(&sql)
                .bind(meal_id)
                .fetch_all(db)
                .await?
        }
        FeedbackFilter::Recent(limit) => {
            let sql = format!("{base} ORDER BY created_at DESC, id LIMIT $1");
            sqlx::query_as::<_, FeedbackEntry>(&sql)
                .bind(limit.max(0))
                .fetch_all(db)
                .await?
        }
    };
    Ok(rows)
}

pub async fn list_all(db: impl PgExecutor<'_>) -> Result<Vec<FeedbackEntry>, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM feedback_entries ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, FeedbackEntry>(&sql).fetch_all(db).await?;
    Ok(rows)
}

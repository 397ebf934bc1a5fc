use sqlx::PgExecutor;
use uuid::Uuid;

use super::repo_types::WasteEntry;
use crate::error::CoreError;

const COLUMNS: &str = "id, scheduled_meal_id, weight_kg, logged_by, notes, logged_at";

pub async fn insert(db: impl PgExecutor<'_>, e: &WasteEntry) -> Result<WasteEntry, CoreError> {
    let sql = format!(
        "INSERT INTO waste_entries ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, WasteEntry>(&sql)
        .bind(e.id)
        .bind(e.scheduled_meal_id)
        .bind(e.weight_kg)
        .bind(e.logged_by)
        .bind(&e.notes)
        .bind(e.logged_at)
        .fetch_one(db)
        .await?;
    Ok(row)
}

/// Newest first, optionally for one scheduled meal.
pub async fn list(
    db: impl PgExecutor<'_>,
    scheduled_meal_id: Option<Uuid>,
) -> Result<Vec<WasteEntry>, CoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM waste_entries \
         WHERE ($1::uuid IS NULL OR scheduled_meal_id = $1) \
         ORDER BY logged_at DESC, id"
    );
    let rows = sqlx::query_as::<_, WasteEntry>(&sql)
        .bind(scheduled_meal_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_all(db: impl PgExecutor<'_>) -> Result<Vec<WasteEntry>, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM waste_entries ORDER BY logged_at, id");
    let rows = sqlx::query_as::<_, WasteEntry>(&sql).fetch_all(db).await?;
    Ok(rows)
}

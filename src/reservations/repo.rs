use sqlx::PgExecutor;
use uuid::Uuid;

use super::repo_types::Reservation;
use crate::error::CoreError;

const COLUMNS: &str = "id, user_id, scheduled_meal_id, portion_size, status, \
    points_earned, capacity_released, confirmed_at, created_at, updated_at";

pub async fn fetch(
    db: impl PgExecutor<'_>,
    id: Uuid,
    for_update: bool,
) -> Result<Reservation, CoreError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {COLUMNS} FROM reservations WHERE id = $1{lock}");
    sqlx::query_as::<_, Reservation>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(CoreError::NotFound("reservation"))
}

/// Any reservation for the pair that still holds the slot.
pub async fn active_for(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    scheduled_meal_id: Uuid,
) -> Result<Option<Reservation>, CoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM reservations \
         WHERE user_id = $1 AND scheduled_meal_id = $2 AND status <> 'cancelled'"
    );
    let row = sqlx::query_as::<_, Reservation>(&sql)
        .bind(user_id)
        .bind(scheduled_meal_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn insert(db: impl PgExecutor<'_>, r: &Reservation) -> Result<Reservation, CoreError> {
    let sql = format!(
        "INSERT INTO reservations ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, Reservation>(&sql)
        .bind(r.id)
        .bind(r.user_id)
        .bind(r.scheduled_meal_id)
        .bind(r.portion_size)
        .bind(r.status)
        .bind(r.points_earned)
        .bind(r.capacity_released)
        .bind(r.confirmed_at)
        .bind(r.created_at)
        .bind(r.updated_at)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn update(db: impl PgExecutor<'_>, r: &Reservation) -> Result<Reservation, CoreError> {
    let sql = format!(
        "UPDATE reservations \
         SET portion_size = $2, status = $3, points_earned = $4, capacity_released = $5, \
             updated_at = $6 \
         WHERE id = $1 RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, Reservation>(&sql)
        .bind(r.id)
        .bind(r.portion_size)
        .bind(r.status)
        .bind(r.points_earned)
        .bind(r.capacity_released)
        .bind(r.updated_at)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn list_by_user(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Vec<Reservation>, CoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM reservations WHERE user_id = $1 ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, Reservation>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_by_schedule(
    db: impl PgExecutor<'_>,
    scheduled_meal_id: Uuid,
) -> Result<Vec<Reservation>, CoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM reservations \
         WHERE scheduled_meal_id = $1 ORDER BY created_at ASC, id"
    );
    let rows = sqlx::query_as::<_, Reservation>(&sql)
        .bind(scheduled_meal_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_all(db: impl PgExecutor<'_>) -> Result<Vec<Reservation>, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM reservations ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, Reservation>(&sql).fetch_all(db).await?;
    Ok(rows)
}

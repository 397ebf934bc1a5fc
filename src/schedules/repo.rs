use sqlx::{PgConnection, PgExecutor};
use time::Date;
use uuid::Uuid;

use super::repo_types::{PortionSize, ScheduledMeal};
use crate::error::CoreError;

const COLUMNS: &str = "id, meal_id, scheduled_date, meal_type, \
    small_capacity, medium_capacity, large_capacity, \
    small_remaining, medium_remaining, large_remaining, \
    confirmation_deadline, is_active, created_at";

pub async fn insert(db: impl PgExecutor<'_>, s: &ScheduledMeal) -> Result<ScheduledMeal, CoreError> {
    let sql = format!(
        "INSERT INTO scheduled_meals ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, ScheduledMeal>(&sql)
        .bind(s.id)
        .bind(s.meal_id)
        .bind(s.scheduled_date)
        .bind(s.meal_type)
        .bind(s.small_capacity)
        .bind(s.medium_capacity)
        .bind(s.large_capacity)
        .bind(s.small_remaining)
        .bind(s.medium_remaining)
        .bind(s.large_remaining)
        .bind(s.confirmation_deadline)
        .bind(s.is_active)
        .bind(s.created_at)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn get(db: impl PgExecutor<'_>, id: Uuid) -> Result<ScheduledMeal, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM scheduled_meals WHERE id = $1");
    sqlx::query_as::<_, ScheduledMeal>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(CoreError::NotFound("scheduled meal"))
}

/// Row lock every capacity writer takes first.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<ScheduledMeal, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM scheduled_meals WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, ScheduledMeal>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CoreError::NotFound("scheduled meal"))
}

pub async fn exists(db: impl PgExecutor<'_>, id: Uuid) -> Result<bool, CoreError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM scheduled_meals WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await?;
    Ok(exists)
}

pub async fn list_active(
    db: impl PgExecutor<'_>,
    start: Option<Date>,
    end: Option<Date>,
) -> Result<Vec<ScheduledMeal>, CoreError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM scheduled_meals \
         WHERE is_active \
           AND ($1::date IS NULL OR scheduled_date >= $1) \
           AND ($2::date IS NULL OR scheduled_date <= $2) \
         ORDER BY scheduled_date ASC, meal_type ASC"
    );
    let rows = sqlx::query_as::<_, ScheduledMeal>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_all(db: impl PgExecutor<'_>) -> Result<Vec<ScheduledMeal>, CoreError> {
    let sql = format!("SELECT {COLUMNS} FROM scheduled_meals ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, ScheduledMeal>(&sql).fetch_all(db).await?;
    Ok(rows)
}

pub async fn deactivate(db: impl PgExecutor<'_>, id: Uuid) -> Result<(), CoreError> {
    sqlx::query("UPDATE scheduled_meals SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Conditional decrement; the `> 0` guard holds even without the row lock.
pub async fn take_portion(
    db: impl PgExecutor<'_>,
    scheduled_meal_id: Uuid,
    size: PortionSize,
) -> Result<(), CoreError> {
    let col = size.remaining_column();
    let sql = format!(
        "UPDATE scheduled_meals SET {col} = {col} - 1, updated_at = now() \
         WHERE id = $1 AND is_active AND {col} > 0"
    );
    let done = sqlx::query(&sql).bind(scheduled_meal_id).execute(db).await?;
    if done.rows_affected() == 0 {
        return Err(CoreError::CapacityExhausted(size));
    }
    Ok(())
}

/// False when the counter is already back at capacity.
pub async fn give_back_portion(
    db: impl PgExecutor<'_>,
    scheduled_meal_id: Uuid,
    size: PortionSize,
) -> Result<bool, CoreError> {
    let (col, cap) = (size.remaining_column(), size.capacity_column());
    let sql = format!(
        "UPDATE scheduled_meals SET {col} = {col} + 1, updated_at = now() \
         WHERE id = $1 AND {col} < {cap}"
    );
    let done = sqlx::query(&sql).bind(scheduled_meal_id).execute(db).await?;
    Ok(done.rows_affected() == 1)
}

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::CoreError;

/// Additive upsert; concurrent deltas for one user accumulate.
pub async fn apply_delta(
    db: impl PgExecutor<'_>,
    user_id: Uuid,
    delta: i64,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO user_points (user_id, eco_points)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET eco_points = user_points.eco_points + EXCLUDED.eco_points,
                      updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(delta)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn balance(db: impl PgExecutor<'_>, user_id: Uuid) -> Result<i64, CoreError> {
    let points: Option<i64> =
        sqlx::query_scalar("SELECT eco_points FROM user_points WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    Ok(points.unwrap_or(0))
}

pub async fn list_all(db: impl PgExecutor<'_>) -> Result<Vec<(Uuid, i64)>, CoreError> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT user_id, eco_points FROM user_points ORDER BY user_id",
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::LogWasteRequest,
    repo_types::{NewWasteEntry, WasteEntry},
};
use crate::{
    error::CoreError,
    notify::{ChangeNotification, EntityKind},
    retry::with_retry,
    state::AppState,
};

#[instrument(skip(state, req, now), fields(scheduled_meal_id = %req.scheduled_meal_id))]
pub async fn log_waste(
    state: &AppState,
    logged_by: Uuid,
    req: LogWasteRequest,
    now: OffsetDateTime,
) -> Result<WasteEntry, CoreError> {
    if req.weight_kg <= Decimal::ZERO {
        return Err(CoreError::InvalidInput("weight_kg must be positive".into()));
    }
    let notes = req
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let new = NewWasteEntry {
        scheduled_meal_id: req.scheduled_meal_id,
        weight_kg: req.weight_kg,
        logged_by,
        notes,
        logged_at: now,
    };
    let entry = with_retry(state.config.retry, "append_waste", || {
        state.store.append_waste(new.clone())
    })
    .await?;
    info!(waste_id = %entry.id, weight_kg = %entry.weight_kg, "waste logged");
    state
        .notifier
        .publish(ChangeNotification::created(EntityKind::WasteEntry, entry.id));
    Ok(entry)
}

pub async fn list_waste(
    state: &AppState,
    scheduled_meal_id: Option<Uuid>,
) -> Result<Vec<WasteEntry>, CoreError> {
    state.store.list_waste(scheduled_meal_id).await
}

use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::ScheduleStats,
    repo_types::{NewScheduledMeal, PortionSize, ScheduledMeal},
};
use crate::{
    error::CoreError,
    notify::{ChangeNotification, EntityKind},
    reservations::repo_types::ReservationStatus,
    retry::with_retry,
    state::AppState,
};

#[instrument(skip(state, new), fields(meal_id = %new.meal_id, date = %new.scheduled_date))]
pub async fn create_schedule(
    state: &AppState,
    new: NewScheduledMeal,
    now: OffsetDateTime,
) -> Result<ScheduledMeal, CoreError> {
    if new.small_capacity < 0 || new.medium_capacity < 0 || new.large_capacity < 0 {
        return Err(CoreError::InvalidInput("capacities must not be negative".into()));
    }
    let schedule = with_retry(state.config.retry, "insert_schedule", || {
        state.store.insert_schedule(new.clone(), now)
    })
    .await?;
    info!(scheduled_meal_id = %schedule.id, "scheduled meal created");
    state
        .notifier
        .publish(ChangeNotification::created(EntityKind::ScheduledMeal, schedule.id));
    Ok(schedule)
}

#[instrument(skip(state))]
pub async fn deactivate_schedule(state: &AppState, id: Uuid) -> Result<ScheduledMeal, CoreError> {
    let schedule = with_retry(state.config.retry, "deactivate_schedule", || {
        state.store.deactivate_schedule(id)
    })
    .await?;
    info!(scheduled_meal_id = %id, "scheduled meal deactivated");
    state
        .notifier
        .publish(ChangeNotification::updated(EntityKind::ScheduledMeal, id));
    Ok(schedule)
}

pub async fn get_schedule(state: &AppState, id: Uuid) -> Result<ScheduledMeal, CoreError> {
    state.store.get_schedule(id).await
}

pub async fn list_schedules(
    state: &AppState,
    start: Option<Date>,
    end: Option<Date>,
) -> Result<Vec<ScheduledMeal>, CoreError> {
    state.store.list_schedules(start, end).await
}

#[instrument(skip(state))]
pub async fn schedule_stats(state: &AppState, id: Uuid) -> Result<ScheduleStats, CoreError> {
    let schedule = state.store.get_schedule(id).await?;
    let reservations = state.store.list_schedule_reservations(id).await?;

    let mut stats = ScheduleStats {
        scheduled_meal_id: id,
        total: 0,
        small: 0,
        medium: 0,
        large: 0,
        small_remaining: schedule.small_remaining,
        medium_remaining: schedule.medium_remaining,
        large_remaining: schedule.large_remaining,
    };
    // open confirmations only, settled reservations leave the count
    for r in reservations
        .iter()
        .filter(|r| r.status == ReservationStatus::Confirmed)
    {
        stats.total += 1;
        match r.portion_size {
            PortionSize::Small => stats.small += 1,
            PortionSize::Medium => stats.medium += 1,
            PortionSize::Large => stats.large += 1,
        }
    }
    Ok(stats)
}

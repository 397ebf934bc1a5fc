use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{Reservation, ReservationStatus};
use crate::{
    error::CoreError,
    notify::{ChangeNotification, EntityKind},
    retry::with_retry,
    schedules::repo_types::PortionSize,
    state::AppState,
};

fn announce(state: &AppState, reservation: &Reservation, created: bool) {
    let n = &state.notifier;
    if created {
        n.publish(ChangeNotification::created(EntityKind::Reservation, reservation.id));
    } else {
        n.publish(ChangeNotification::updated(EntityKind::Reservation, reservation.id));
    }
    n.publish(ChangeNotification::updated(
        EntityKind::ScheduledMeal,
        reservation.scheduled_meal_id,
    ));
    n.publish(ChangeNotification::updated(EntityKind::Points, reservation.user_id));
}

/// Loads a reservation the caller owns. Someone else's reservation reads as
/// missing.
async fn owned(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Reservation, CoreError> {
    let r = state.store.get_reservation(id).await?;
    if r.user_id != user_id {
        warn!(%user_id, reservation_id = %id, owner = %r.user_id, "reservation of another user");
        return Err(CoreError::NotFound("reservation"));
    }
    Ok(r)
}

#[instrument(skip(state, now))]
pub async fn create_reservation(
    state: &AppState,
    user_id: Uuid,
    scheduled_meal_id: Uuid,
    portion: PortionSize,
    now: OffsetDateTime,
) -> Result<Reservation, CoreError> {
    let reservation = with_retry(state.config.retry, "create_reservation", || {
        state
            .store
            .create_reservation(user_id, scheduled_meal_id, portion, now)
    })
    .await?;
    info!(
        reservation_id = %reservation.id,
        points = reservation.points_earned,
        "reservation confirmed"
    );
    announce(state, &reservation, true);
    Ok(reservation)
}

#[instrument(skip(state, now))]
pub async fn change_portion(
    state: &AppState,
    user_id: Uuid,
    reservation_id: Uuid,
    portion: PortionSize,
    now: OffsetDateTime,
) -> Result<Reservation, CoreError> {
    let before = owned(state, user_id, reservation_id).await?;
    let reservation = with_retry(state.config.retry, "change_portion", || {
        state.store.change_portion(reservation_id, portion, now)
    })
    .await?;
    if before.portion_size != reservation.portion_size {
        info!(from = %before.portion_size, to = %reservation.portion_size, "portion changed");
        announce(state, &reservation, false);
    }
    Ok(reservation)
}

#[instrument(skip(state, now))]
pub async fn cancel_reservation(
    state: &AppState,
    user_id: Uuid,
    reservation_id: Uuid,
    now: OffsetDateTime,
) -> Result<Reservation, CoreError> {
    owned(state, user_id, reservation_id).await?;
    let policy = state.config.cancellation;
    let reservation = with_retry(state.config.retry, "cancel_reservation", || {
        state.store.cancel_reservation(reservation_id, now, policy)
    })
    .await?;
    info!(
        released = reservation.capacity_released,
        retracted = policy.retract_points,
        "reservation cancelled"
    );
    announce(state, &reservation, false);
    Ok(reservation)
}

/// Marks a confirmed reservation as served or missed. Staff operation, so no
/// ownership check.
#[instrument(skip(state, now))]
pub async fn settle_reservation(
    state: &AppState,
    reservation_id: Uuid,
    status: ReservationStatus,
    now: OffsetDateTime,
) -> Result<Reservation, CoreError> {
    let reservation = with_retry(state.config.retry, "settle_reservation", || {
        state.store.settle_reservation(reservation_id, status, now)
    })
    .await?;
    info!(%status, "reservation settled");
    state
        .notifier
        .publish(ChangeNotification::updated(EntityKind::Reservation, reservation.id));
    Ok(reservation)
}

pub async fn get_reservation(
    state: &AppState,
    user_id: Uuid,
    reservation_id: Uuid,
) -> Result<Reservation, CoreError> {
    owned(state, user_id, reservation_id).await
}

pub async fn list_reservations(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<Reservation>, CoreError> {
    state.store.list_user_reservations(user_id).await
}

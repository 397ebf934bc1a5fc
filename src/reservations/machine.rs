//! Reservation state machine.
//!
//! `confirmed -> {cancelled, completed, no_show}`; every other state is
//! terminal. The checks here are pure and run inside the store's atomic unit,
//! before anything is written.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{Reservation, ReservationStatus};
use crate::{error::CoreError, schedules::repo_types::ScheduledMeal};

/// What a cancellation undoes. Both default to off: a cancelled reservation
/// keeps its portion and its points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPolicy {
    pub release_capacity: bool,
    pub retract_points: bool,
}

pub fn check_create(
    meal: &ScheduledMeal,
    active: Option<&Reservation>,
    now: OffsetDateTime,
) -> Result<(), CoreError> {
    if now >= meal.confirmation_deadline {
        return Err(CoreError::DeadlineExpired);
    }
    if active.is_some() {
        return Err(CoreError::DuplicateReservation);
    }
    Ok(())
}

pub fn check_portion_change(
    reservation: &Reservation,
    meal: &ScheduledMeal,
    now: OffsetDateTime,
) -> Result<(), CoreError> {
    if reservation.status != ReservationStatus::Confirmed {
        return Err(CoreError::InvalidTransition {
            from: reservation.status,
            action: "change the portion of",
        });
    }
    if now >= meal.confirmation_deadline {
        return Err(CoreError::DeadlineExpired);
    }
    Ok(())
}

pub fn check_cancel(reservation: &Reservation) -> Result<(), CoreError> {
    if reservation.status != ReservationStatus::Confirmed {
        return Err(CoreError::InvalidTransition {
            from: reservation.status,
            action: "cancel",
        });
    }
    Ok(())
}

pub fn check_settle(reservation: &Reservation, to: ReservationStatus) -> Result<(), CoreError> {
    let action = match to {
        ReservationStatus::Completed => "complete",
        ReservationStatus::NoShow => "mark as no-show",
        ReservationStatus::Confirmed | ReservationStatus::Cancelled => {
            return Err(CoreError::InvalidTransition {
                from: reservation.status,
                action: "settle to a non-terminal state",
            })
        }
    };
    if reservation.status != ReservationStatus::Confirmed {
        return Err(CoreError::InvalidTransition {
            from: reservation.status,
            action,
        });
    }
    Ok(())
}

/// Balance delta of cancelling `reservation` under `policy`.
pub fn cancel_points_delta(reservation: &Reservation, policy: CancellationPolicy) -> i64 {
    if policy.retract_points {
        -i64::from(reservation.points_earned)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};
    use uuid::Uuid;

    use super::*;
    use crate::schedules::repo_types::{MealType, NewScheduledMeal, PortionSize};

    fn meal() -> ScheduledMeal {
        NewScheduledMeal {
            meal_id: Uuid::new_v4(),
            scheduled_date: date!(2025-03-10),
            meal_type: MealType::Dinner,
            small_capacity: 1,
            medium_capacity: 1,
            large_capacity: 1,
            confirmation_deadline: datetime!(2025-03-10 17:00 UTC),
        }
        .into_record(datetime!(2025-03-09 08:00 UTC))
    }

    fn reservation(meal: &mut ScheduledMeal, status: ReservationStatus) -> Reservation {
        let token = meal.try_reserve(PortionSize::Small).expect("capacity");
        let mut r = Reservation::confirmed(token, Uuid::new_v4(), 5, datetime!(2025-03-10 09:00 UTC));
        r.status = status;
        r
    }

    #[test]
    fn create_at_or_after_deadline_is_rejected() {
        let m = meal();
        assert!(check_create(&m, None, datetime!(2025-03-10 16:59:59 UTC)).is_ok());
        assert!(matches!(
            check_create(&m, None, datetime!(2025-03-10 17:00 UTC)),
            Err(CoreError::DeadlineExpired)
        ));
    }

    #[test]
    fn deadline_is_checked_before_duplicates() {
        let mut m = meal();
        let existing = reservation(&mut m, ReservationStatus::Confirmed);
        let late = datetime!(2025-03-10 18:00 UTC);
        assert!(matches!(
            check_create(&m, Some(&existing), late),
            Err(CoreError::DeadlineExpired)
        ));
        let early = datetime!(2025-03-10 12:00 UTC);
        assert!(matches!(
            check_create(&m, Some(&existing), early),
            Err(CoreError::DuplicateReservation)
        ));
    }

    #[test]
    fn portion_change_needs_confirmed_and_open_window() {
        let mut m = meal();
        let r = reservation(&mut m, ReservationStatus::Confirmed);
        assert!(check_portion_change(&r, &m, datetime!(2025-03-10 12:00 UTC)).is_ok());
        assert!(matches!(
            check_portion_change(&r, &m, datetime!(2025-03-10 17:00 UTC)),
            Err(CoreError::DeadlineExpired)
        ));

        let cancelled = reservation(&mut meal(), ReservationStatus::Cancelled);
        assert!(matches!(
            check_portion_change(&cancelled, &m, datetime!(2025-03-10 12:00 UTC)),
            Err(CoreError::InvalidTransition { from: ReservationStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn only_confirmed_reservations_cancel() {
        let mut m = meal();
        assert!(check_cancel(&reservation(&mut m, ReservationStatus::Confirmed)).is_ok());
        for status in [
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
            ReservationStatus::NoShow,
        ] {
            let r = reservation(&mut meal(), status);
            assert!(check_cancel(&r).is_err(), "{status} should not cancel");
        }
    }

    #[test]
    fn settlement_targets_are_terminal_only() {
        let mut m = meal();
        let r = reservation(&mut m, ReservationStatus::Confirmed);
        assert!(check_settle(&r, ReservationStatus::Completed).is_ok());
        assert!(check_settle(&r, ReservationStatus::NoShow).is_ok());
        assert!(check_settle(&r, ReservationStatus::Cancelled).is_err());
        assert!(check_settle(&r, ReservationStatus::Confirmed).is_err());

        let done = reservation(&mut meal(), ReservationStatus::Completed);
        assert!(matches!(
            check_settle(&done, ReservationStatus::NoShow),
            Err(CoreError::InvalidTransition { from: ReservationStatus::Completed, .. })
        ));
    }

    #[test]
    fn points_are_kept_on_cancel_by_default() {
        let mut m = meal();
        let r = reservation(&mut m, ReservationStatus::Confirmed);
        assert_eq!(cancel_points_delta(&r, CancellationPolicy::default()), 0);
        let retract = CancellationPolicy {
            retract_points: true,
            ..Default::default()
        };
        assert_eq!(cancel_points_delta(&r, retract), -5);
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::schedules::{ledger::ReservationToken, repo_types::PortionSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "confirmation_status", rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
            ReservationStatus::NoShow => "no_show",
        }
    }

    /// Confirmed demand: pending or served. Settlement to `completed` keeps a
    /// reservation in the statistics, `cancelled` and `no_show` drop it.
    pub fn counts_as_confirmed(self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed | ReservationStatus::Completed
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's claim on one portion of a scheduled meal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scheduled_meal_id: Uuid,
    pub portion_size: PortionSize,
    pub status: ReservationStatus,
    pub points_earned: i32,
    /// Set when cancellation handed the portion back to the ledger.
    pub capacity_released: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Reservation {
    pub fn confirmed(
        token: ReservationToken,
        user_id: Uuid,
        points_earned: i32,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            scheduled_meal_id: token.scheduled_meal_id,
            portion_size: token.portion,
            status: ReservationStatus::Confirmed,
            points_earned,
            capacity_released: false,
            confirmed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this reservation still occupies a portion in the ledger.
    pub fn holds_capacity(&self) -> bool {
        !self.capacity_released
    }
}

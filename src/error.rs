use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{reservations::repo_types::ReservationStatus, schedules::repo_types::PortionSize};

/// Unique index guarding "one non-cancelled reservation per (user, meal)".
const ACTIVE_RESERVATION_INDEX: &str = "reservations_one_active_per_user";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("confirmation deadline has passed")]
    DeadlineExpired,

    #[error("no {0} portions left")]
    CapacityExhausted(PortionSize),

    #[error("scheduled meal is no longer active")]
    MealInactive,

    #[error("an active reservation already exists for this meal")]
    DuplicateReservation,

    #[error("cannot {action} a {from} reservation")]
    InvalidTransition {
        from: ReservationStatus,
        action: &'static str,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage conflict, try again")]
    StorageConflict,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::DeadlineExpired => "deadline_expired",
            CoreError::CapacityExhausted(_) => "capacity_exhausted",
            CoreError::MealInactive => "meal_inactive",
            CoreError::DuplicateReservation => "duplicate_reservation",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::NotFound(_) => "not_found",
            CoreError::StorageConflict => "storage_conflict",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::DeadlineExpired | CoreError::MealInactive => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::CapacityExhausted(_)
            | CoreError::DuplicateReservation
            | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::StorageConflict => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        let mapped = match &e {
            sqlx::Error::RowNotFound => Some(CoreError::NotFound("record")),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => Some(CoreError::StorageConflict),
                Some("23505") if db.constraint() == Some(ACTIVE_RESERVATION_INDEX) => {
                    Some(CoreError::DuplicateReservation)
                }
                _ => None,
            },
            _ => None,
        };
        mapped.unwrap_or_else(|| CoreError::Internal(anyhow::Error::new(e)))
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_names_the_size() {
        let err = CoreError::CapacityExhausted(PortionSize::Small);
        assert_eq!(err.to_string(), "no small portions left");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_transition_message() {
        let err = CoreError::InvalidTransition {
            from: ReservationStatus::NoShow,
            action: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel a no_show reservation");
        assert_eq!(err.code(), "invalid_transition");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_are_server_errors() {
        let err = CoreError::from(anyhow::anyhow!("pool closed"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "pool closed");
    }
}

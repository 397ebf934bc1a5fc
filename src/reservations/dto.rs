use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::ReservationStatus;
use crate::schedules::repo_types::PortionSize;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub scheduled_meal_id: Uuid,
    pub portion_size: PortionSize,
}

#[derive(Debug, Deserialize)]
pub struct ChangePortionRequest {
    pub portion_size: PortionSize,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub status: ReservationStatus,
}

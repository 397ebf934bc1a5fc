//! Eco-points policy: small portions and feedback earn points.

use crate::schedules::repo_types::PortionSize;

pub const FEEDBACK_POINTS: i32 = 5;

pub fn reservation_points(size: PortionSize) -> i32 {
    match size {
        PortionSize::Small => 5,
        PortionSize::Medium => 2,
        PortionSize::Large => 0,
    }
}

/// Balance delta for switching a reservation from `from` to `to`.
pub fn portion_change_delta(from: PortionSize, to: PortionSize) -> i64 {
    i64::from(reservation_points(to)) - i64::from(reservation_points(from))
}

//! Capacity ledger: per-size portion counters of a scheduled meal.
//!
//! Counters only move through [`ScheduledMeal::try_reserve`] and
//! [`ScheduledMeal::release`]. Callers hold the meal exclusively (store write
//! lock, or a `FOR UPDATE` row lock) for the whole check-and-decrement.

use tracing::warn;
use uuid::Uuid;

use super::repo_types::{PortionSize, ScheduledMeal};
use crate::error::CoreError;

/// Proof that one portion of `portion` was taken from `scheduled_meal_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationToken {
    pub scheduled_meal_id: Uuid,
    pub portion: PortionSize,
}

impl ScheduledMeal {
    pub fn capacity(&self, size: PortionSize) -> i32 {
        match size {
            PortionSize::Small => self.small_capacity,
            PortionSize::Medium => self.medium_capacity,
            PortionSize::Large => self.large_capacity,
        }
    }

    pub fn remaining(&self, size: PortionSize) -> i32 {
        match size {
            PortionSize::Small => self.small_remaining,
            PortionSize::Medium => self.medium_remaining,
            PortionSize::Large => self.large_remaining,
        }
    }

    fn remaining_mut(&mut self, size: PortionSize) -> &mut i32 {
        match size {
            PortionSize::Small => &mut self.small_remaining,
            PortionSize::Medium => &mut self.medium_remaining,
            PortionSize::Large => &mut self.large_remaining,
        }
    }

    /// Takes one portion of `size`. Never substitutes another size.
    pub fn try_reserve(&mut self, size: PortionSize) -> Result<ReservationToken, CoreError> {
        if !self.is_active {
            return Err(CoreError::MealInactive);
        }
        let scheduled_meal_id = self.id;
        let remaining = self.remaining_mut(size);
        if *remaining <= 0 {
            return Err(CoreError::CapacityExhausted(size));
        }
        *remaining -= 1;
        Ok(ReservationToken {
            scheduled_meal_id,
            portion: size,
        })
    }

    /// Gives one portion of `size` back. Returns false when the counter is
    /// already at full capacity.
    pub fn release(&mut self, size: PortionSize) -> bool {
        let (id, capacity) = (self.id, self.capacity(size));
        let remaining = self.remaining_mut(size);
        if *remaining >= capacity {
            warn!(scheduled_meal_id = %id, portion = %size, "release above capacity ignored");
            return false;
        }
        *remaining += 1;
        true
    }
}

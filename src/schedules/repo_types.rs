use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Meal-type slot of a scheduled meal. Ordering follows the day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "meal_category", rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "portion_size", rename_all = "snake_case")]
pub enum PortionSize {
    Small,
    Medium,
    Large,
}

impl PortionSize {
    pub fn as_str(self) -> &'static str {
        match self {
            PortionSize::Small => "small",
            PortionSize::Medium => "medium",
            PortionSize::Large => "large",
        }
    }

    /// Column holding the remaining counter for this size.
    pub(crate) fn remaining_column(self) -> &'static str {
        match self {
            PortionSize::Small => "small_remaining",
            PortionSize::Medium => "medium_remaining",
            PortionSize::Large => "large_remaining",
        }
    }

    pub(crate) fn capacity_column(self) -> &'static str {
        match self {
            PortionSize::Small => "small_capacity",
            PortionSize::Medium => "medium_capacity",
            PortionSize::Large => "large_capacity",
        }
    }
}

impl fmt::Display for PortionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One meal offering on one date for one meal-type slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScheduledMeal {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub scheduled_date: Date,
    pub meal_type: MealType,
    pub small_capacity: i32,
    pub medium_capacity: i32,
    pub large_capacity: i32,
    pub small_remaining: i32,
    pub medium_remaining: i32,
    pub large_remaining: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmation_deadline: OffsetDateTime,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewScheduledMeal {
    pub meal_id: Uuid,
    pub scheduled_date: Date,
    pub meal_type: MealType,
    pub small_capacity: i32,
    pub medium_capacity: i32,
    pub large_capacity: i32,
    pub confirmation_deadline: OffsetDateTime,
}

impl NewScheduledMeal {
    /// Builds the stored record with every counter at full capacity.
    pub fn into_record(self, now: OffsetDateTime) -> ScheduledMeal {
        ScheduledMeal {
            id: Uuid::new_v4(),
            meal_id: self.meal_id,
            scheduled_date: self.scheduled_date,
            meal_type: self.meal_type,
            small_capacity: self.small_capacity,
            medium_capacity: self.medium_capacity,
            large_capacity: self.large_capacity,
            small_remaining: self.small_capacity,
            medium_remaining: self.medium_capacity,
            large_remaining: self.large_capacity,
            confirmation_deadline: self.confirmation_deadline,
            is_active: true,
            created_at: now,
        }
    }
}

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{MealType, NewScheduledMeal};

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub meal_id: Uuid,
    pub scheduled_date: Date,
    pub meal_type: MealType,
    #[serde(default)]
    pub small_capacity: i32,
    #[serde(default)]
    pub medium_capacity: i32,
    #[serde(default)]
    pub large_capacity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmation_deadline: OffsetDateTime,
}

impl From<CreateScheduleRequest> for NewScheduledMeal {
    fn from(r: CreateScheduleRequest) -> Self {
        NewScheduledMeal {
            meal_id: r.meal_id,
            scheduled_date: r.scheduled_date,
            meal_type: r.meal_type,
            small_capacity: r.small_capacity,
            medium_capacity: r.medium_capacity,
            large_capacity: r.large_capacity,
            confirmation_deadline: r.confirmation_deadline,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

/// Open confirmations for one scheduled meal, by portion size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStats {
    pub scheduled_meal_id: Uuid,
    pub total: i64,
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub small_remaining: i32,
    pub medium_remaining: i32,
    pub large_remaining: i32,
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Leftover food weighed after a scheduled meal. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WasteEntry {
    pub id: Uuid,
    pub scheduled_meal_id: Uuid,
    pub weight_kg: Decimal,
    pub logged_by: Uuid,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub logged_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewWasteEntry {
    pub scheduled_meal_id: Uuid,
    pub weight_kg: Decimal,
    pub logged_by: Uuid,
    pub notes: Option<String>,
    pub logged_at: OffsetDateTime,
}

impl NewWasteEntry {
    pub fn into_record(self) -> WasteEntry {
        WasteEntry {
            id: Uuid::new_v4(),
            scheduled_meal_id: self.scheduled_meal_id,
            weight_kg: self.weight_kg,
            logged_by: self.logged_by,
            notes: self.notes,
            logged_at: self.logged_at,
        }
    }
}

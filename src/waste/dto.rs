use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LogWasteRequest {
    pub scheduled_meal_id: Uuid,
    pub weight_kg: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WasteFilter {
    pub scheduled_meal_id: Option<Uuid>,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    feedback::repo_types::FeedbackEntry,
    reservations::repo_types::{Reservation, ReservationStatus},
    schedules::repo_types::{PortionSize, ScheduledMeal},
    waste::repo_types::WasteEntry,
};

/// One committed write, appended in the same atomic unit as the write itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    ScheduleAdded {
        schedule: ScheduledMeal,
    },
    ScheduleDeactivated {
        scheduled_meal_id: Uuid,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    PortionChanged {
        reservation_id: Uuid,
        user_id: Uuid,
        from: PortionSize,
        to: PortionSize,
        points_delta: i64,
    },
    ReservationStatusChanged {
        reservation_id: Uuid,
        user_id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
        points_delta: i64,
        capacity_released: bool,
    },
    WasteLogged {
        entry: WasteEntry,
    },
    FeedbackSubmitted {
        entry: FeedbackEntry,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ScheduleAdded { .. } => "schedule_added",
            Event::ScheduleDeactivated { .. } => "schedule_deactivated",
            Event::ReservationCreated { .. } => "reservation_created",
            Event::PortionChanged { .. } => "portion_changed",
            Event::ReservationStatusChanged { .. } => "reservation_status_changed",
            Event::WasteLogged { .. } => "waste_logged",
            Event::FeedbackSubmitted { .. } => "feedback_submitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub seq: i64,
    pub event: Event,
}

/// Consistent read snapshot of every table the aggregation views need.
/// Records are in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub schedules: Vec<ScheduledMeal>,
    pub reservations: Vec<Reservation>,
    pub waste: Vec<WasteEntry>,
    pub feedback: Vec<FeedbackEntry>,
    pub balances: Vec<(Uuid, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_kind_tag() {
        let event = Event::ScheduleDeactivated {
            scheduled_meal_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["kind"], event.kind());
        let back: Event = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }
}

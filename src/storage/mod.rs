//! Transactional record store behind the core.
//!
//! Every write method is one atomic unit: the state-machine and ledger checks,
//! the record write, the points delta and the journal append either all land
//! or none do.

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    error::CoreError,
    feedback::repo_types::{FeedbackEntry, FeedbackFilter, NewFeedback},
    reservations::{
        machine::CancellationPolicy,
        repo_types::{Reservation, ReservationStatus},
    },
    schedules::repo_types::{NewScheduledMeal, PortionSize, ScheduledMeal},
    waste::repo_types::{NewWasteEntry, WasteEntry},
};

pub mod journal;
pub mod memory;
pub mod postgres;

pub use journal::{Event, EventLog, JournalEntry};

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_schedule(
        &self,
        new: NewScheduledMeal,
        now: OffsetDateTime,
    ) -> Result<ScheduledMeal, CoreError>;
    async fn deactivate_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError>;
    async fn get_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError>;
    /// Active schedules in the inclusive date range, by date then meal type.
    async fn list_schedules(
        &self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<ScheduledMeal>, CoreError>;

    async fn create_reservation(
        &self,
        user_id: Uuid,
        scheduled_meal_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError>;
    async fn change_portion(
        &self,
        reservation_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError>;
    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: OffsetDateTime,
        policy: CancellationPolicy,
    ) -> Result<Reservation, CoreError>;
    async fn settle_reservation(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError>;
    async fn get_reservation(&self, id: Uuid) -> Result<Reservation, CoreError>;
    /// Newest first.
    async fn list_user_reservations(&self, user_id: Uuid) -> Result<Vec<Reservation>, CoreError>;
    async fn list_schedule_reservations(
        &self,
        scheduled_meal_id: Uuid,
    ) -> Result<Vec<Reservation>, CoreError>;

    async fn append_waste(&self, new: NewWasteEntry) -> Result<WasteEntry, CoreError>;
    /// Newest first.
    async fn list_waste(&self, scheduled_meal_id: Option<Uuid>)
        -> Result<Vec<WasteEntry>, CoreError>;

    async fn append_feedback(&self, new: NewFeedback) -> Result<FeedbackEntry, CoreError>;
    async fn list_feedback(&self, filter: FeedbackFilter) -> Result<Vec<FeedbackEntry>, CoreError>;

    async fn balance(&self, user_id: Uuid) -> Result<i64, CoreError>;

    async fn snapshot(&self) -> Result<EventLog, CoreError>;
    /// Journal entries with `seq > after`, in sequence order.
    async fn journal_since(&self, after: i64) -> Result<Vec<JournalEntry>, CoreError>;
}

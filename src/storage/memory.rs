//! In-process store. One write lock per operation gives each write the same
//! all-or-nothing behaviour as a database transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Event, EventLog, JournalEntry, Store};
use crate::{
    error::CoreError,
    feedback::repo_types::{FeedbackEntry, FeedbackFilter, NewFeedback},
    points::policy::{self, FEEDBACK_POINTS},
    reservations::{
        machine::{self, CancellationPolicy},
        repo_types::{Reservation, ReservationStatus},
    },
    schedules::repo_types::{NewScheduledMeal, PortionSize, ScheduledMeal},
    waste::repo_types::{NewWasteEntry, WasteEntry},
};

#[derive(Default)]
struct Tables {
    schedules: HashMap<Uuid, ScheduledMeal>,
    schedule_order: Vec<Uuid>,
    reservations: HashMap<Uuid, Reservation>,
    reservation_order: Vec<Uuid>,
    waste: Vec<WasteEntry>,
    feedback: Vec<FeedbackEntry>,
    balances: HashMap<Uuid, i64>,
    journal: Vec<Event>,
}

impl Tables {
    fn active_reservation(&self, user_id: Uuid, scheduled_meal_id: Uuid) -> Option<&Reservation> {
        self.reservations.values().find(|r| {
            r.user_id == user_id
                && r.scheduled_meal_id == scheduled_meal_id
                && r.status != ReservationStatus::Cancelled
        })
    }

    fn reservation(&self, id: Uuid) -> Result<&Reservation, CoreError> {
        self.reservations
            .get(&id)
            .ok_or(CoreError::NotFound("reservation"))
    }

    fn apply_delta(&mut self, user_id: Uuid, delta: i64) {
        *self.balances.entry(user_id).or_insert(0) += delta;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_schedule(
        &self,
        new: NewScheduledMeal,
        now: OffsetDateTime,
    ) -> Result<ScheduledMeal, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let schedule = new.into_record(now);
        t.schedules.insert(schedule.id, schedule.clone());
        t.schedule_order.push(schedule.id);
        t.journal.push(Event::ScheduleAdded {
            schedule: schedule.clone(),
        });
        Ok(schedule)
    }

    async fn deactivate_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let schedule = t
            .schedules
            .get_mut(&id)
            .ok_or(CoreError::NotFound("scheduled meal"))?;
        if schedule.is_active {
            schedule.is_active = false;
            t.journal.push(Event::ScheduleDeactivated {
                scheduled_meal_id: id,
            });
        }
        Ok(schedule.clone())
    }

    async fn get_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError> {
        let t = self.tables.read().await;
        t.schedules
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("scheduled meal"))
    }

    async fn list_schedules(
        &self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<ScheduledMeal>, CoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<ScheduledMeal> = t
            .schedule_order
            .iter()
            .filter_map(|id| t.schedules.get(id))
            .filter(|s| s.is_active)
            .filter(|s| start.map_or(true, |d| s.scheduled_date >= d))
            .filter(|s| end.map_or(true, |d| s.scheduled_date <= d))
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.scheduled_date, s.meal_type));
        Ok(out)
    }

    async fn create_reservation(
        &self,
        user_id: Uuid,
        scheduled_meal_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;

        let meal = t
            .schedules
            .get(&scheduled_meal_id)
            .ok_or(CoreError::NotFound("scheduled meal"))?;
        machine::check_create(meal, t.active_reservation(user_id, scheduled_meal_id), now)?;

        let token = t
            .schedules
            .get_mut(&scheduled_meal_id)
            .ok_or(CoreError::NotFound("scheduled meal"))?
            .try_reserve(portion)?;

        let points = policy::reservation_points(portion);
        let reservation = Reservation::confirmed(token, user_id, points, now);
        t.reservations.insert(reservation.id, reservation.clone());
        t.reservation_order.push(reservation.id);
        t.apply_delta(user_id, i64::from(points));
        t.journal.push(Event::ReservationCreated {
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }

    async fn change_portion(
        &self,
        reservation_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;

        let current = t.reservation(reservation_id)?.clone();
        let meal = t
            .schedules
            .get_mut(&current.scheduled_meal_id)
            .ok_or(CoreError::NotFound("scheduled meal"))?;
        machine::check_portion_change(&current, meal, now)?;
        if current.portion_size == portion {
            return Ok(current);
        }

        // new portion first: on failure the old one is still held
        meal.try_reserve(portion)?;
        if !meal.release(current.portion_size) {
            meal.release(portion);
            return Err(CoreError::Internal(anyhow::anyhow!(
                "{} counter of scheduled meal {} already at capacity while held by reservation {}",
                current.portion_size,
                meal.id,
                reservation_id
            )));
        }

        let delta = policy::portion_change_delta(current.portion_size, portion);
        let updated = {
            let r = t
                .reservations
                .get_mut(&reservation_id)
                .ok_or(CoreError::NotFound("reservation"))?;
            r.portion_size = portion;
            r.points_earned = policy::reservation_points(portion);
            r.updated_at = now;
            r.clone()
        };
        t.apply_delta(current.user_id, delta);
        t.journal.push(Event::PortionChanged {
            reservation_id,
            user_id: current.user_id,
            from: current.portion_size,
            to: portion,
            points_delta: delta,
        });
        Ok(updated)
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: OffsetDateTime,
        policy: CancellationPolicy,
    ) -> Result<Reservation, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;

        let current = t.reservation(reservation_id)?.clone();
        machine::check_cancel(&current)?;

        let released = policy.release_capacity
            && t
                .schedules
                .get_mut(&current.scheduled_meal_id)
                .map_or(false, |meal| meal.release(current.portion_size));
        let delta = machine::cancel_points_delta(&current, policy);

        let updated = {
            let r = t
                .reservations
                .get_mut(&reservation_id)
                .ok_or(CoreError::NotFound("reservation"))?;
            r.status = ReservationStatus::Cancelled;
            r.capacity_released = released;
            r.updated_at = now;
            r.clone()
        };
        if delta != 0 {
            t.apply_delta(current.user_id, delta);
        }
        t.journal.push(Event::ReservationStatusChanged {
            reservation_id,
            user_id: current.user_id,
            from: current.status,
            to: ReservationStatus::Cancelled,
            points_delta: delta,
            capacity_released: released,
        });
        Ok(updated)
    }

    async fn settle_reservation(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;

        let current = t.reservation(reservation_id)?.clone();
        machine::check_settle(&current, status)?;

        let updated = {
            let r = t
                .reservations
                .get_mut(&reservation_id)
                .ok_or(CoreError::NotFound("reservation"))?;
            r.status = status;
            r.updated_at = now;
            r.clone()
        };
        t.journal.push(Event::ReservationStatusChanged {
            reservation_id,
            user_id: current.user_id,
            from: current.status,
            to: status,
            points_delta: 0,
            capacity_released: false,
        });
        Ok(updated)
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Reservation, CoreError> {
        let t = self.tables.read().await;
        t.reservation(id).cloned()
    }

    async fn list_user_reservations(&self, user_id: Uuid) -> Result<Vec<Reservation>, CoreError> {
        let t = self.tables.read().await;
        Ok(t.reservation_order
            .iter()
            .rev()
            .filter_map(|id| t.reservations.get(id))
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_schedule_reservations(
        &self,
        scheduled_meal_id: Uuid,
    ) -> Result<Vec<Reservation>, CoreError> {
        let t = self.tables.read().await;
        Ok(t.reservation_order
            .iter()
            .filter_map(|id| t.reservations.get(id))
            .filter(|r| r.scheduled_meal_id == scheduled_meal_id)
            .cloned()
            .collect())
    }

    async fn append_waste(&self, new: NewWasteEntry) -> Result<WasteEntry, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        if !t.schedules.contains_key(&new.scheduled_meal_id) {
            return Err(CoreError::NotFound("scheduled meal"));
        }
        let entry = new.into_record();
        t.waste.push(entry.clone());
        t.journal.push(Event::WasteLogged {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    async fn list_waste(
        &self,
        scheduled_meal_id: Option<Uuid>,
    ) -> Result<Vec<WasteEntry>, CoreError> {
        let t = self.tables.read().await;
        Ok(t.waste
            .iter()
            .rev()
            .filter(|w| scheduled_meal_id.map_or(true, |id| w.scheduled_meal_id == id))
            .cloned()
            .collect())
    }

    async fn append_feedback(&self, new: NewFeedback) -> Result<FeedbackEntry, CoreError> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        if let Some(id) = new.scheduled_meal_id {
            if !t.schedules.contains_key(&id) {
                return Err(CoreError::NotFound("scheduled meal"));
            }
        }
        let entry = new.into_record(FEEDBACK_POINTS);
        t.feedback.push(entry.clone());
        t.apply_delta(entry.user_id, i64::from(entry.points_earned));
        t.journal.push(Event::FeedbackSubmitted {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    async fn list_feedback(&self, filter: FeedbackFilter) -> Result<Vec<FeedbackEntry>, CoreError> {
        let t = self.tables.read().await;
        let newest_first = t.feedback.iter().rev();
        let out = match filter {
            FeedbackFilter::ByUser(user_id) => newest_first
                .filter(|f| f.user_id == user_id)
                .cloned()
                .collect(),
            FeedbackFilter::ByMeal(meal_id) => newest_first
                .filter(|f| f.meal_id == meal_id)
                .cloned()
                .collect(),
            FeedbackFilter::Recent(limit) => newest_first
                .take(usize::try_from(limit).unwrap_or(0))
                .cloned()
                .collect(),
        };
        Ok(out)
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, CoreError> {
        let t = self.tables.read().await;
        Ok(t.balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn snapshot(&self) -> Result<EventLog, CoreError> {
        let t = self.tables.read().await;
        let mut balances: Vec<(Uuid, i64)> = t.balances.iter().map(|(u, p)| (*u, *p)).collect();
        balances.sort_by_key(|(u, _)| *u);
        Ok(EventLog {
            schedules: t
                .schedule_order
                .iter()
                .filter_map(|id| t.schedules.get(id))
                .cloned()
                .collect(),
            reservations: t
                .reservation_order
                .iter()
                .filter_map(|id| t.reservations.get(id))
                .cloned()
                .collect(),
            waste: t.waste.clone(),
            feedback: t.feedback.clone(),
            balances,
        })
    }

    async fn journal_since(&self, after: i64) -> Result<Vec<JournalEntry>, CoreError> {
        let t = self.tables.read().await;
        let skip = usize::try_from(after).unwrap_or(0);
        Ok(t.journal
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, event)| JournalEntry {
                seq: i as i64 + 1,
                event: event.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use time::macros::{date, datetime};

    use super::*;
    use crate::schedules::repo_types::MealType;

    fn lunch(small: i32, medium: i32, large: i32) -> NewScheduledMeal {
        NewScheduledMeal {
            meal_id: Uuid::new_v4(),
            scheduled_date: date!(2025-04-02),
            meal_type: MealType::Lunch,
            small_capacity: small,
            medium_capacity: medium,
            large_capacity: large,
            confirmation_deadline: datetime!(2025-04-02 11:00 UTC),
        }
    }

    const NOW: OffsetDateTime = datetime!(2025-04-02 08:00 UTC);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_unit_goes_to_exactly_one_caller() {
        let store = Arc::new(MemoryStore::new());
        let meal = store.insert_schedule(lunch(1, 0, 0), NOW).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_reservation(Uuid::new_v4(), meal.id, PortionSize::Small, NOW)
                    .await
            }));
        }

        let mut won = 0;
        for h in handles {
            match h.await.expect("task panicked") {
                Ok(_) => won += 1,
                Err(CoreError::CapacityExhausted(PortionSize::Small)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        let after = store.get_schedule(meal.id).await.unwrap();
        assert_eq!(after.small_remaining, 0);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_trace() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(0, 1, 1), NOW).await.unwrap();
        let user = Uuid::new_v4();

        let err = store
            .create_reservation(user, meal.id, PortionSize::Small, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CapacityExhausted(_)));

        assert!(store.list_user_reservations(user).await.unwrap().is_empty());
        assert_eq!(store.balance(user).await.unwrap(), 0);
        let journal = store.journal_since(0).await.unwrap();
        assert_eq!(journal.len(), 1, "only the schedule itself is journaled");
    }

    #[tokio::test]
    async fn portion_change_that_cannot_be_satisfied_keeps_the_old_portion() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(1, 1, 0), NOW).await.unwrap();
        let user = Uuid::new_v4();
        let r = store
            .create_reservation(user, meal.id, PortionSize::Medium, NOW)
            .await
            .unwrap();

        let err = store
            .change_portion(r.id, PortionSize::Large, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CapacityExhausted(PortionSize::Large)));

        let still = store.get_reservation(r.id).await.unwrap();
        assert_eq!(still.portion_size, PortionSize::Medium);
        let m = store.get_schedule(meal.id).await.unwrap();
        assert_eq!(m.medium_remaining, 0);
        assert_eq!(m.large_remaining, 0);
        assert_eq!(store.balance(user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn portion_change_with_a_drifted_counter_rolls_back() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(1, 1, 0), NOW).await.unwrap();
        let user = Uuid::new_v4();
        let r = store
            .create_reservation(user, meal.id, PortionSize::Small, NOW)
            .await
            .unwrap();
        // counter back at capacity although the reservation still holds a unit
        store
            .tables
            .write()
            .await
            .schedules
            .get_mut(&meal.id)
            .unwrap()
            .small_remaining = 1;

        let err = store
            .change_portion(r.id, PortionSize::Medium, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));

        let m = store.get_schedule(meal.id).await.unwrap();
        assert_eq!((m.small_remaining, m.medium_remaining), (1, 1));
        let still = store.get_reservation(r.id).await.unwrap();
        assert_eq!(still.portion_size, PortionSize::Small);
        assert_eq!(store.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn portion_change_moves_capacity_and_points() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(1, 1, 1), NOW).await.unwrap();
        let user = Uuid::new_v4();
        let r = store
            .create_reservation(user, meal.id, PortionSize::Large, NOW)
            .await
            .unwrap();

        let changed = store
            .change_portion(r.id, PortionSize::Small, NOW)
            .await
            .unwrap();
        assert_eq!(changed.portion_size, PortionSize::Small);
        assert_eq!(changed.points_earned, 5);

        let m = store.get_schedule(meal.id).await.unwrap();
        assert_eq!((m.small_remaining, m.medium_remaining, m.large_remaining), (0, 1, 1));
        assert_eq!(store.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn cancel_policy_controls_release_and_retraction() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(2, 0, 0), NOW).await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ra = store
            .create_reservation(a, meal.id, PortionSize::Small, NOW)
            .await
            .unwrap();
        let rb = store
            .create_reservation(b, meal.id, PortionSize::Small, NOW)
            .await
            .unwrap();

        let kept = store
            .cancel_reservation(ra.id, NOW, CancellationPolicy::default())
            .await
            .unwrap();
        assert_eq!(kept.status, ReservationStatus::Cancelled);
        assert!(!kept.capacity_released);
        assert_eq!(store.balance(a).await.unwrap(), 5);
        assert_eq!(store.get_schedule(meal.id).await.unwrap().small_remaining, 0);

        let undo_all = CancellationPolicy {
            release_capacity: true,
            retract_points: true,
        };
        let released = store.cancel_reservation(rb.id, NOW, undo_all).await.unwrap();
        assert!(released.capacity_released);
        assert_eq!(store.balance(b).await.unwrap(), 0);
        assert_eq!(store.get_schedule(meal.id).await.unwrap().small_remaining, 1);
    }

    #[tokio::test]
    async fn cancelled_pair_can_reserve_again() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(1, 1, 1), NOW).await.unwrap();
        let user = Uuid::new_v4();
        let first = store
            .create_reservation(user, meal.id, PortionSize::Medium, NOW)
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_reservation(user, meal.id, PortionSize::Small, NOW)
                .await,
            Err(CoreError::DuplicateReservation)
        ));
        store
            .cancel_reservation(first.id, NOW, CancellationPolicy::default())
            .await
            .unwrap();
        let second = store
            .create_reservation(user, meal.id, PortionSize::Small, NOW)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        // points of the cancelled reservation are not retracted
        assert_eq!(store.balance(user).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn waste_and_feedback_need_a_known_schedule() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        let err = store
            .append_waste(NewWasteEntry {
                scheduled_meal_id: missing,
                weight_kg: Decimal::new(15, 1),
                logged_by: Uuid::new_v4(),
                notes: None,
                logged_at: NOW,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let user = Uuid::new_v4();
        let unscheduled = store
            .append_feedback(NewFeedback {
                user_id: user,
                meal_id: Uuid::new_v4(),
                scheduled_meal_id: None,
                rating: 4,
                reasons: vec![],
                comment: None,
                created_at: NOW,
            })
            .await
            .unwrap();
        assert_eq!(unscheduled.points_earned, 5);
        assert_eq!(store.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn journal_is_sequenced_and_resumable() {
        let store = MemoryStore::new();
        let meal = store.insert_schedule(lunch(1, 1, 1), NOW).await.unwrap();
        store
            .create_reservation(Uuid::new_v4(), meal.id, PortionSize::Large, NOW)
            .await
            .unwrap();
        store.deactivate_schedule(meal.id).await.unwrap();
        store.deactivate_schedule(meal.id).await.unwrap();

        let all = store.journal_since(0).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![1, 2, 3],
            "second deactivation is a no-op"
        );
        let tail = store.journal_since(2).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].event.kind(), "schedule_deactivated");
    }
}

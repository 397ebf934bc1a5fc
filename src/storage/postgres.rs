//! Postgres store. Each write is a single transaction that locks the
//! scheduled-meal row before the reservation row, so concurrent writers on one
//! meal queue up behind `FOR UPDATE` instead of overselling. The SQL for each
//! table lives in its feature's `repo` module; this file owns the
//! transactions and the event journal.

use async_trait::async_trait;
use sqlx::{types::Json, PgConnection, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{Event, EventLog, JournalEntry, Store};
use crate::{
    error::CoreError,
    feedback::{
        repo as feedback_repo,
        repo_types::{FeedbackEntry, FeedbackFilter, NewFeedback},
    },
    points::{
        policy::{self, FEEDBACK_POINTS},
        repo as points_repo,
    },
    reservations::{
        machine::{self, CancellationPolicy},
        repo as reservation_repo,
        repo_types::{Reservation, ReservationStatus},
    },
    schedules::{
        repo as schedule_repo,
        repo_types::{NewScheduledMeal, PortionSize, ScheduledMeal},
    },
    waste::{
        repo as waste_repo,
        repo_types::{NewWasteEntry, WasteEntry},
    },
};

/// Advisory lock serializing journal appends so `seq` order is commit order.
const JOURNAL_LOCK: i64 = 0x6d65_616c_6d61_7465;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Locks the meal, then the reservation, in the order every writer uses.
async fn lock_reservation_with_meal(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> Result<(ScheduledMeal, Reservation), CoreError> {
    let peek = reservation_repo::fetch(&mut *conn, reservation_id, false).await?;
    let meal = schedule_repo::lock(conn, peek.scheduled_meal_id).await?;
    let reservation = reservation_repo::fetch(&mut *conn, reservation_id, true).await?;
    Ok((meal, reservation))
}

async fn append_event(conn: &mut PgConnection, event: &Event) -> Result<i64, CoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(JOURNAL_LOCK)
        .execute(&mut *conn)
        .await?;
    let seq: i64 =
        sqlx::query_scalar("INSERT INTO events (kind, payload) VALUES ($1, $2) RETURNING seq")
            .bind(event.kind())
            .bind(Json(event))
            .fetch_one(&mut *conn)
            .await?;
    Ok(seq)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_schedule(
        &self,
        new: NewScheduledMeal,
        now: OffsetDateTime,
    ) -> Result<ScheduledMeal, CoreError> {
        let mut tx = self.db.begin().await?;
        let schedule = schedule_repo::insert(&mut *tx, &new.into_record(now)).await?;
        append_event(
            &mut tx,
            &Event::ScheduleAdded {
                schedule: schedule.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(schedule)
    }

    async fn deactivate_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError> {
        let mut tx = self.db.begin().await?;
        let mut schedule = schedule_repo::lock(&mut tx, id).await?;
        if schedule.is_active {
            schedule_repo::deactivate(&mut *tx, id).await?;
            schedule.is_active = false;
            append_event(
                &mut tx,
                &Event::ScheduleDeactivated {
                    scheduled_meal_id: id,
                },
            )
            .await?;
        }
        tx.commit().await?;
        Ok(schedule)
    }

    async fn get_schedule(&self, id: Uuid) -> Result<ScheduledMeal, CoreError> {
        schedule_repo::get(&self.db, id).await
    }

    async fn list_schedules(
        &self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<ScheduledMeal>, CoreError> {
        schedule_repo::list_active(&self.db, start, end).await
    }

    async fn create_reservation(
        &self,
        user_id: Uuid,
        scheduled_meal_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut tx = self.db.begin().await?;

        let mut meal = schedule_repo::lock(&mut tx, scheduled_meal_id).await?;
        let active = reservation_repo::active_for(&mut *tx, user_id, scheduled_meal_id).await?;
        machine::check_create(&meal, active.as_ref(), now)?;

        let token = meal.try_reserve(portion)?;
        schedule_repo::take_portion(&mut *tx, scheduled_meal_id, portion).await?;

        let points = policy::reservation_points(portion);
        let reservation = Reservation::confirmed(token, user_id, points, now);
        let reservation = reservation_repo::insert(&mut *tx, &reservation).await?;

        points_repo::apply_delta(&mut *tx, user_id, i64::from(points)).await?;
        append_event(
            &mut tx,
            &Event::ReservationCreated {
                reservation: reservation.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(reservation)
    }

    async fn change_portion(
        &self,
        reservation_id: Uuid,
        portion: PortionSize,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut tx = self.db.begin().await?;
        let (mut meal, current) = lock_reservation_with_meal(&mut tx, reservation_id).await?;
        machine::check_portion_change(&current, &meal, now)?;
        if current.portion_size == portion {
            return Ok(current);
        }

        meal.try_reserve(portion)?;
        schedule_repo::take_portion(&mut *tx, meal.id, portion).await?;
        if !schedule_repo::give_back_portion(&mut *tx, meal.id, current.portion_size).await? {
            return Err(CoreError::Internal(anyhow::anyhow!(
                "{} counter of scheduled meal {} already at capacity while held by reservation {}",
                current.portion_size,
                meal.id,
                reservation_id
            )));
        }

        let mut next = current.clone();
        next.portion_size = portion;
        next.points_earned = policy::reservation_points(portion);
        next.updated_at = now;
        let updated = reservation_repo::update(&mut *tx, &next).await?;

        let delta = policy::portion_change_delta(current.portion_size, portion);
        points_repo::apply_delta(&mut *tx, current.user_id, delta).await?;
        append_event(
            &mut tx,
            &Event::PortionChanged {
                reservation_id,
                user_id: current.user_id,
                from: current.portion_size,
                to: portion,
                points_delta: delta,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        now: OffsetDateTime,
        policy: CancellationPolicy,
    ) -> Result<Reservation, CoreError> {
        let mut tx = self.db.begin().await?;
        let (meal, current) = lock_reservation_with_meal(&mut tx, reservation_id).await?;
        machine::check_cancel(&current)?;

        let released = if policy.release_capacity {
            schedule_repo::give_back_portion(&mut *tx, meal.id, current.portion_size).await?
        } else {
            false
        };

        let mut next = current.clone();
        next.status = ReservationStatus::Cancelled;
        next.capacity_released = released;
        next.updated_at = now;
        let updated = reservation_repo::update(&mut *tx, &next).await?;

        let delta = machine::cancel_points_delta(&current, policy);
        if delta != 0 {
            points_repo::apply_delta(&mut *tx, current.user_id, delta).await?;
        }
        append_event(
            &mut tx,
            &Event::ReservationStatusChanged {
                reservation_id,
                user_id: current.user_id,
                from: current.status,
                to: ReservationStatus::Cancelled,
                points_delta: delta,
                capacity_released: released,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn settle_reservation(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
        now: OffsetDateTime,
    ) -> Result<Reservation, CoreError> {
        let mut tx = self.db.begin().await?;
        let current = reservation_repo::fetch(&mut *tx, reservation_id, true).await?;
        machine::check_settle(&current, status)?;

        let mut next = current.clone();
        next.status = status;
        next.updated_at = now;
        let updated = reservation_repo::update(&mut *tx, &next).await?;
        append_event(
            &mut tx,
            &Event::ReservationStatusChanged {
                reservation_id,
                user_id: current.user_id,
                from: current.status,
                to: status,
                points_delta: 0,
                capacity_released: false,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Reservation, CoreError> {
        reservation_repo::fetch(&self.db, id, false).await
    }

    async fn list_user_reservations(&self, user_id: Uuid) -> Result<Vec<Reservation>, CoreError> {
        reservation_repo::list_by_user(&self.db, user_id).await
    }

    async fn list_schedule_reservations(
        &self,
        scheduled_meal_id: Uuid,
    ) -> Result<Vec<Reservation>, CoreError> {
        reservation_repo::list_by_schedule(&self.db, scheduled_meal_id).await
    }

    async fn append_waste(&self, new: NewWasteEntry) -> Result<WasteEntry, CoreError> {
        let mut tx = self.db.begin().await?;
        if !schedule_repo::exists(&mut *tx, new.scheduled_meal_id).await? {
            return Err(CoreError::NotFound("scheduled meal"));
        }
        let entry = waste_repo::insert(&mut *tx, &new.into_record()).await?;
        append_event(
            &mut tx,
            &Event::WasteLogged {
                entry: entry.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_waste(
        &self,
        scheduled_meal_id: Option<Uuid>,
    ) -> Result<Vec<WasteEntry>, CoreError> {
        waste_repo::list(&self.db, scheduled_meal_id).await
    }

    async fn append_feedback(&self, new: NewFeedback) -> Result<FeedbackEntry, CoreError> {
        let mut tx = self.db.begin().await?;
        if let Some(id) = new.scheduled_meal_id {
            if !schedule_repo::exists(&mut *tx, id).await? {
                return Err(CoreError::NotFound("scheduled meal"));
            }
        }
        let entry = feedback_repo::insert(&mut *tx, &new.into_record(FEEDBACK_POINTS)).await?;
        points_repo::apply_delta(&mut *tx, entry.user_id, i64::from(entry.points_earned)).await?;
        append_event(
            &mut tx,
            &Event::FeedbackSubmitted {
                entry: entry.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_feedback(&self, filter: FeedbackFilter) -> Result<Vec<FeedbackEntry>, CoreError> {
        feedback_repo::list(&self.db, filter).await
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, CoreError> {
        points_repo::balance(&self.db, user_id).await
    }

    async fn snapshot(&self) -> Result<EventLog, CoreError> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let schedules = schedule_repo::list_all(&mut *tx).await?;
        let reservations = reservation_repo::list_all(&mut *tx).await?;
        let waste = waste_repo::list_all(&mut *tx).await?;
        let feedback = feedback_repo::list_all(&mut *tx).await?;
        let balances = points_repo::list_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(EventLog {
            schedules,
            reservations,
            waste,
            feedback,
            balances,
        })
    }

    async fn journal_since(&self, after: i64) -> Result<Vec<JournalEntry>, CoreError> {
        let rows = sqlx::query_as::<_, (i64, Json<Event>)>(
            "SELECT seq, payload FROM events WHERE seq > $1 ORDER BY seq",
        )
        .bind(after)
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(seq, Json(event))| JournalEntry { seq, event })
            .collect())
    }
}

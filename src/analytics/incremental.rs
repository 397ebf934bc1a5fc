//! Materialized aggregation folded from the journal.
//!
//! Every query here must agree with the matching function in `full` over a
//! snapshot taken at the same sequence number.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use time::Date;
use tracing::warn;
use uuid::Uuid;

use super::{
    full::{dashboard_start, in_window, utc_date},
    views::{
        self, Dashboard, LeaderboardEntry, MealStats, MealStatsAcc, UserStanding, WasteTrendDay,
    },
};
use crate::{
    reservations::repo_types::ReservationStatus,
    schedules::repo_types::{MealType, PortionSize},
    storage::{Event, JournalEntry},
};

#[derive(Debug, Clone, Copy)]
struct Slot {
    date: Date,
    meal_type: MealType,
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    user_id: Uuid,
    scheduled_meal_id: Uuid,
    portion: PortionSize,
    status: ReservationStatus,
}

#[derive(Debug, Default)]
pub struct Materialized {
    last_seq: i64,
    slots: HashMap<Uuid, Slot>,
    reservations: HashMap<Uuid, Tracked>,
    demand: BTreeMap<(Date, MealType), MealStatsAcc>,
    waste: BTreeMap<(Date, MealType), Decimal>,
    ratings_by_day: BTreeMap<Date, (i64, i64)>,
    users: HashMap<Uuid, UserStanding>,
}

impl Materialized {
    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    /// Folds one journal entry. Entries at or below `last_seq` are ignored,
    /// so replaying an overlapping batch is harmless.
    pub fn apply(&mut self, entry: &JournalEntry) {
        if entry.seq <= self.last_seq {
            return;
        }
        self.last_seq = entry.seq;

        match &entry.event {
            Event::ScheduleAdded { schedule } => {
                let slot = Slot {
                    date: schedule.scheduled_date,
                    meal_type: schedule.meal_type,
                };
                self.slots.insert(schedule.id, slot);
                self.demand_at(slot).schedules += 1;
            }
            Event::ScheduleDeactivated { .. } => {}
            Event::ReservationCreated { reservation: r } => {
                let tracked = Tracked {
                    user_id: r.user_id,
                    scheduled_meal_id: r.scheduled_meal_id,
                    portion: r.portion_size,
                    status: r.status,
                };
                self.reservations.insert(r.id, tracked);
                self.user(r.user_id).eco_points += i64::from(r.points_earned);
                if r.status.counts_as_confirmed() {
                    self.count(tracked, 1);
                }
            }
            Event::PortionChanged {
                reservation_id,
                user_id,
                to,
                points_delta,
                ..
            } => {
                self.user(*user_id).eco_points += points_delta;
                let Some(mut tracked) = self.reservations.get(reservation_id).copied() else {
                    warn!(%reservation_id, "portion change for unknown reservation");
                    return;
                };
                if tracked.status.counts_as_confirmed() {
                    self.count(tracked, -1);
                    tracked.portion = *to;
                    self.count(tracked, 1);
                } else {
                    tracked.portion = *to;
                }
                self.reservations.insert(*reservation_id, tracked);
            }
            Event::ReservationStatusChanged {
                reservation_id,
                user_id,
                to,
                points_delta,
                ..
            } => {
                self.user(*user_id).eco_points += points_delta;
                let Some(mut tracked) = self.reservations.get(reservation_id).copied() else {
                    warn!(%reservation_id, "status change for unknown reservation");
                    return;
                };
                let was = tracked.status.counts_as_confirmed();
                let now = to.counts_as_confirmed();
                if was && !now {
                    self.count(tracked, -1);
                } else if !was && now {
                    self.count(tracked, 1);
                }
                tracked.status = *to;
                self.reservations.insert(*reservation_id, tracked);
            }
            Event::WasteLogged { entry } => {
                let Some(slot) = self.slots.get(&entry.scheduled_meal_id).copied() else {
                    warn!(scheduled_meal_id = %entry.scheduled_meal_id, "waste for unknown meal");
                    return;
                };
                *self
                    .waste
                    .entry((utc_date(entry.logged_at), slot.meal_type))
                    .or_insert(Decimal::ZERO) += entry.weight_kg;
            }
            Event::FeedbackSubmitted { entry } => {
                self.user(entry.user_id).eco_points += i64::from(entry.points_earned);
                let day = self
                    .ratings_by_day
                    .entry(utc_date(entry.created_at))
                    .or_insert((0, 0));
                day.0 += i64::from(entry.rating);
                day.1 += 1;
                let slot = entry
                    .scheduled_meal_id
                    .and_then(|id| self.slots.get(&id).copied());
                if let Some(slot) = slot {
                    let acc = self.demand_at(slot);
                    acc.rating_sum += i64::from(entry.rating);
                    acc.rating_count += 1;
                }
            }
        }
    }

    fn demand_at(&mut self, slot: Slot) -> &mut MealStatsAcc {
        self.demand.entry((slot.date, slot.meal_type)).or_default()
    }

    fn user(&mut self, user_id: Uuid) -> &mut UserStanding {
        self.users.entry(user_id).or_default()
    }

    /// Adds `delta` confirmations for the reservation's slot and user.
    fn count(&mut self, tracked: Tracked, delta: i64) {
        if let Some(slot) = self.slots.get(&tracked.scheduled_meal_id).copied() {
            self.demand_at(slot).count_portion(tracked.portion, delta);
        }
        let user = self.user(tracked.user_id);
        user.confirmed += delta;
        if tracked.portion == PortionSize::Small {
            user.small_confirmed += delta;
        }
    }

    pub fn meal_stats(&self, start: Option<Date>, end: Option<Date>) -> Vec<MealStats> {
        let mut by_type: BTreeMap<MealType, MealStatsAcc> = BTreeMap::new();
        for ((date, meal_type), acc) in &self.demand {
            if in_window(*date, start, end) {
                by_type.entry(*meal_type).or_default().merge(acc);
            }
        }
        views::finish_meal_stats(by_type)
    }

    pub fn waste_trend(&self, days: u32, today: Date) -> Vec<WasteTrendDay> {
        views::trailing_days(today, days)
            .into_iter()
            .map(|date| {
                let mut row = WasteTrendDay::empty(date);
                for meal_type in MealType::ALL {
                    if let Some(kg) = self.waste.get(&(date, meal_type)) {
                        row.add(meal_type, *kg);
                    }
                }
                row
            })
            .collect()
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        views::rank(&self.users, limit)
    }

    pub fn dashboard(&self, today: Date) -> Dashboard {
        let start = dashboard_start(today);
        let total_waste_kg: Decimal = self
            .waste
            .iter()
            .filter(|((date, _), _)| in_window(*date, Some(start), Some(today)))
            .map(|(_, kg)| *kg)
            .sum();
        let (sum, count) = self
            .ratings_by_day
            .range(start..=today)
            .fold((0i64, 0i64), |(s, c), (_, (ds, dc))| (s + ds, c + dc));

        Dashboard {
            period_start: start,
            period_end: today,
            participants: self.users.len() as i64,
            week_stats: self.meal_stats(Some(start), Some(today)),
            total_waste_kg,
            avg_rating: views::dashboard_rating(sum, count),
        }
    }
}

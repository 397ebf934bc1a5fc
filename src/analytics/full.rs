//! On-demand aggregation: recompute every view from a consistent snapshot.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::views::{
    self, Dashboard, LeaderboardEntry, MealStats, MealStatsAcc, UserStanding, WasteTrendDay,
    DASHBOARD_DAYS,
};
use crate::{
    schedules::repo_types::{MealType, PortionSize, ScheduledMeal},
    storage::EventLog,
};

pub(crate) fn utc_date(at: OffsetDateTime) -> Date {
    at.to_offset(UtcOffset::UTC).date()
}

pub(crate) fn in_window(date: Date, start: Option<Date>, end: Option<Date>) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

pub(crate) fn dashboard_start(today: Date) -> Date {
    today
        .checked_sub(Duration::days(DASHBOARD_DAYS))
        .unwrap_or(Date::MIN)
}

pub fn meal_stats(log: &EventLog, start: Option<Date>, end: Option<Date>) -> Vec<MealStats> {
    let window: HashMap<Uuid, &ScheduledMeal> = log
        .schedules
        .iter()
        .filter(|s| in_window(s.scheduled_date, start, end))
        .map(|s| (s.id, s))
        .collect();

    let mut by_type: BTreeMap<MealType, MealStatsAcc> = BTreeMap::new();
    for s in window.values() {
        by_type.entry(s.meal_type).or_default().schedules += 1;
    }
    for r in log.reservations.iter().filter(|r| r.status.counts_as_confirmed()) {
        if let Some(s) = window.get(&r.scheduled_meal_id) {
            by_type
                .entry(s.meal_type)
                .or_default()
                .count_portion(r.portion_size, 1);
        }
    }
    for f in &log.feedback {
        let Some(s) = f.scheduled_meal_id.and_then(|id| window.get(&id)) else {
            continue;
        };
        let acc = by_type.entry(s.meal_type).or_default();
        acc.rating_sum += i64::from(f.rating);
        acc.rating_count += 1;
    }
    views::finish_meal_stats(by_type)
}

pub fn waste_trend(log: &EventLog, days: u32, today: Date) -> Vec<WasteTrendDay> {
    let mut rows: BTreeMap<Date, WasteTrendDay> = views::trailing_days(today, days)
        .into_iter()
        .map(|d| (d, WasteTrendDay::empty(d)))
        .collect();
    let meal_types: HashMap<Uuid, MealType> =
        log.schedules.iter().map(|s| (s.id, s.meal_type)).collect();

    for w in &log.waste {
        let Some(row) = rows.get_mut(&utc_date(w.logged_at)) else {
            continue;
        };
        if let Some(meal_type) = meal_types.get(&w.scheduled_meal_id) {
            row.add(*meal_type, w.weight_kg);
        }
    }
    rows.into_values().collect()
}

pub(crate) fn standings(log: &EventLog) -> HashMap<Uuid, UserStanding> {
    let mut out: HashMap<Uuid, UserStanding> = log
        .balances
        .iter()
        .map(|(user_id, points)| {
            (
                *user_id,
                UserStanding {
                    eco_points: *points,
                    ..UserStanding::default()
                },
            )
        })
        .collect();
    for r in log.reservations.iter().filter(|r| r.status.counts_as_confirmed()) {
        if let Some(s) = out.get_mut(&r.user_id) {
            s.confirmed += 1;
            if r.portion_size == PortionSize::Small {
                s.small_confirmed += 1;
            }
        }
    }
    out
}

pub fn leaderboard(log: &EventLog, limit: usize) -> Vec<LeaderboardEntry> {
    views::rank(&standings(log), limit)
}

pub fn dashboard(log: &EventLog, today: Date) -> Dashboard {
    let start = dashboard_start(today);
    let total_waste_kg: Decimal = log
        .waste
        .iter()
        .filter(|w| in_window(utc_date(w.logged_at), Some(start), Some(today)))
        .map(|w| w.weight_kg)
        .sum();
    let (sum, count) = log
        .feedback
        .iter()
        .filter(|f| in_window(utc_date(f.created_at), Some(start), Some(today)))
        .fold((0i64, 0i64), |(s, c), f| (s + i64::from(f.rating), c + 1));

    Dashboard {
        period_start: start,
        period_end: today,
        participants: log.balances.len() as i64,
        week_stats: meal_stats(log, Some(start), Some(today)),
        total_waste_kg,
        avg_rating: views::dashboard_rating(sum, count),
    }
}

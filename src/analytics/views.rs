//! Result shapes shared by the full and incremental aggregation paths.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::schedules::repo_types::{MealType, PortionSize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealStats {
    pub meal_type: MealType,
    pub total_confirmations: i64,
    pub small_count: i64,
    pub medium_count: i64,
    pub large_count: i64,
    pub avg_rating: Option<f64>,
}

/// Integer running sums, so both paths produce bit-identical averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MealStatsAcc {
    pub schedules: i64,
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub rating_sum: i64,
    pub rating_count: i64,
}

impl MealStatsAcc {
    pub fn count_portion(&mut self, size: PortionSize, delta: i64) {
        match size {
            PortionSize::Small => self.small += delta,
            PortionSize::Medium => self.medium += delta,
            PortionSize::Large => self.large += delta,
        }
    }

    pub fn merge(&mut self, other: &MealStatsAcc) {
        self.schedules += other.schedules;
        self.small += other.small;
        self.medium += other.medium;
        self.large += other.large;
        self.rating_sum += other.rating_sum;
        self.rating_count += other.rating_count;
    }

    pub fn into_stats(self, meal_type: MealType) -> MealStats {
        MealStats {
            meal_type,
            total_confirmations: self.small + self.medium + self.large,
            small_count: self.small,
            medium_count: self.medium,
            large_count: self.large,
            avg_rating: average(self.rating_sum, self.rating_count),
        }
    }
}

pub fn average(sum: i64, count: i64) -> Option<f64> {
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Rows for meal types that have at least one schedule, breakfast first.
pub fn finish_meal_stats(by_type: BTreeMap<MealType, MealStatsAcc>) -> Vec<MealStats> {
    by_type
        .into_iter()
        .filter(|(_, acc)| acc.schedules > 0)
        .map(|(meal_type, acc)| acc.into_stats(meal_type))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WasteTrendDay {
    pub date: Date,
    pub total_kg: Decimal,
    pub by_meal_type: BTreeMap<MealType, Decimal>,
}

impl WasteTrendDay {
    pub fn empty(date: Date) -> Self {
        Self {
            date,
            total_kg: Decimal::ZERO,
            by_meal_type: MealType::ALL.iter().map(|t| (*t, Decimal::ZERO)).collect(),
        }
    }

    pub fn add(&mut self, meal_type: MealType, kg: Decimal) {
        self.total_kg += kg;
        *self.by_meal_type.entry(meal_type).or_insert(Decimal::ZERO) += kg;
    }
}

/// The trailing `days` calendar days ending at `today`, oldest first.
pub fn trailing_days(today: Date, days: u32) -> Vec<Date> {
    let mut out = Vec::with_capacity(days as usize);
    let mut day = today;
    for _ in 0..days {
        out.push(day);
        match day.previous_day() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    out.reverse();
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStanding {
    pub eco_points: i64,
    pub confirmed: i64,
    pub small_confirmed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: Uuid,
    pub eco_points: i64,
    pub confirmed_count: i64,
    pub small_count: i64,
}

/// Points desc, confirmed desc, small confirmed desc, user id asc.
pub fn rank(standings: &HashMap<Uuid, UserStanding>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(&Uuid, &UserStanding)> = standings.iter().collect();
    rows.sort_by(|(ua, a), (ub, b)| {
        b.eco_points
            .cmp(&a.eco_points)
            .then(b.confirmed.cmp(&a.confirmed))
            .then(b.small_confirmed.cmp(&a.small_confirmed))
            .then(ua.cmp(ub))
    });
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (user_id, s))| LeaderboardEntry {
            rank: i as u32 + 1,
            user_id: *user_id,
            eco_points: s.eco_points,
            confirmed_count: s.confirmed,
            small_count: s.small_confirmed,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub period_start: Date,
    pub period_end: Date,
    /// Users holding a points balance, i.e. anyone who has reserved or left
    /// feedback at least once. Roles are not known to the store, so this is
    /// not restricted to students.
    pub participants: i64,
    pub week_stats: Vec<MealStats>,
    pub total_waste_kg: Decimal,
    pub avg_rating: f64,
}

pub const DASHBOARD_DAYS: i64 = 7;

/// One decimal place; 0.0 without feedback.
pub fn dashboard_rating(sum: i64, count: i64) -> f64 {
    average(sum, count)
        .map(|avg| (avg * 10.0).round() / 10.0)
        .unwrap_or(0.0)
}

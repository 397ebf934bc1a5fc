use time::Date;
use tokio::sync::MutexGuard;
use tracing::{debug, instrument};

use super::{
    full,
    incremental::Materialized,
    views::{Dashboard, LeaderboardEntry, MealStats, WasteTrendDay},
};
use crate::{config::AnalyticsMode, error::CoreError, state::AppState, storage::EventLog};

pub const MAX_TREND_DAYS: u32 = 366;
pub const MAX_LEADERBOARD: usize = 100;

enum Source<'a> {
    Snapshot(EventLog),
    Folded(MutexGuard<'a, Materialized>),
}

async fn source(state: &AppState) -> Result<Source<'_>, CoreError> {
    match state.config.analytics_mode {
        AnalyticsMode::OnDemand => Ok(Source::Snapshot(state.store.snapshot().await?)),
        AnalyticsMode::Materialized => Ok(Source::Folded(catch_up(state).await?)),
    }
}

/// Folds every journal entry committed since the last call.
pub async fn catch_up(state: &AppState) -> Result<MutexGuard<'_, Materialized>, CoreError> {
    let mut view = state.materialized.lock().await;
    let entries = state.store.journal_since(view.last_seq()).await?;
    if !entries.is_empty() {
        debug!(count = entries.len(), from = view.last_seq(), "folding journal");
    }
    for entry in &entries {
        view.apply(entry);
    }
    Ok(view)
}

#[instrument(skip(state))]
pub async fn meal_stats(
    state: &AppState,
    start: Option<Date>,
    end: Option<Date>,
) -> Result<Vec<MealStats>, CoreError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(CoreError::InvalidInput("start must not be after end".into()));
        }
    }
    Ok(match source(state).await? {
        Source::Snapshot(log) => full::meal_stats(&log, start, end),
        Source::Folded(view) => view.meal_stats(start, end),
    })
}

#[instrument(skip(state))]
pub async fn waste_trend(
    state: &AppState,
    days: u32,
    today: Date,
) -> Result<Vec<WasteTrendDay>, CoreError> {
    if days > MAX_TREND_DAYS {
        return Err(CoreError::InvalidInput(format!(
            "days must be at most {MAX_TREND_DAYS}"
        )));
    }
    Ok(match source(state).await? {
        Source::Snapshot(log) => full::waste_trend(&log, days, today),
        Source::Folded(view) => view.waste_trend(days, today),
    })
}

#[instrument(skip(state))]
pub async fn leaderboard(
    state: &AppState,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, CoreError> {
    let limit = limit.min(MAX_LEADERBOARD);
    Ok(match source(state).await? {
        Source::Snapshot(log) => full::leaderboard(&log, limit),
        Source::Folded(view) => view.leaderboard(limit),
    })
}

#[instrument(skip(state))]
pub async fn dashboard(state: &AppState, today: Date) -> Result<Dashboard, CoreError> {
    Ok(match source(state).await? {
        Source::Snapshot(log) => full::dashboard(&log, today),
        Source::Folded(view) => view.dashboard(today),
    })
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rust_decimal::Decimal;
    use time::{
        macros::{date, datetime},
        Duration, OffsetDateTime,
    };
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        feedback::{dto::SubmitFeedbackRequest, services::submit_feedback},
        reservations::{
            machine::CancellationPolicy, repo_types::ReservationStatus, services as reservations,
        },
        schedules::{
            repo_types::{MealType, NewScheduledMeal, PortionSize, ScheduledMeal},
            services::create_schedule,
        },
        waste::{dto::LogWasteRequest, services::log_waste},
    };

    const SIZES: [PortionSize; 3] = [PortionSize::Small, PortionSize::Medium, PortionSize::Large];

    fn materialized(cancellation: CancellationPolicy) -> AppState {
        let mut config = AppConfig::memory();
        config.analytics_mode = AnalyticsMode::Materialized;
        config.cancellation = cancellation;
        AppState::fake_with(config)
    }

    async fn schedule(
        state: &AppState,
        day: Date,
        meal_type: MealType,
        capacity: i32,
    ) -> ScheduledMeal {
        let deadline = day.midnight().assume_utc() + Duration::hours(10);
        create_schedule(
            state,
            NewScheduledMeal {
                meal_id: Uuid::new_v4(),
                scheduled_date: day,
                meal_type,
                small_capacity: capacity,
                medium_capacity: capacity,
                large_capacity: capacity,
                confirmation_deadline: deadline,
            },
            deadline - Duration::days(2),
        )
        .await
        .expect("schedule")
    }

    async fn waste(state: &AppState, meal: &ScheduledMeal, kg: Decimal, at: OffsetDateTime) {
        log_waste(
            state,
            Uuid::new_v4(),
            LogWasteRequest {
                scheduled_meal_id: meal.id,
                weight_kg: kg,
                notes: None,
            },
            at,
        )
        .await
        .expect("waste");
    }

    async fn feedback(
        state: &AppState,
        user: Uuid,
        meal: &ScheduledMeal,
        rating: i16,
        at: OffsetDateTime,
    ) {
        submit_feedback(
            state,
            user,
            SubmitFeedbackRequest {
                meal_id: meal.meal_id,
                scheduled_meal_id: Some(meal.id),
                rating,
                reasons: vec![],
                comment: None,
            },
            at,
        )
        .await
        .expect("feedback");
    }

    /// Drives a seeded mix of every write, ignoring domain rejections.
    async fn random_workload(state: &AppState, seed: u64) -> Vec<ScheduledMeal> {
        let mut rng = StdRng::seed_from_u64(seed);
        let first = date!(2025-10-01);
        let mut meals = Vec::new();
        for d in 0..5 {
            for meal_type in [MealType::Breakfast, MealType::Lunch, MealType::Snack] {
                let day = first + Duration::days(d);
                meals.push(schedule(state, day, meal_type, rng.gen_range(0..3)).await);
            }
        }
        let users: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let mut made = Vec::new();

        for _ in 0..200 {
            let meal = &meals[rng.gen_range(0..meals.len())];
            let user = users[rng.gen_range(0..users.len())];
            let now = meal.confirmation_deadline - Duration::hours(rng.gen_range(-1..6));
            match rng.gen_range(0..7) {
                0 | 1 => {
                    let size = SIZES[rng.gen_range(0..3)];
                    if let Ok(r) =
                        reservations::create_reservation(state, user, meal.id, size, now).await
                    {
                        made.push(r);
                    }
                }
                2 if !made.is_empty() => {
                    let r = &made[rng.gen_range(0..made.len())];
                    let size = SIZES[rng.gen_range(0..3)];
                    let _ = reservations::change_portion(state, r.user_id, r.id, size, now).await;
                }
                3 if !made.is_empty() => {
                    let r = &made[rng.gen_range(0..made.len())];
                    let _ = reservations::cancel_reservation(state, r.user_id, r.id, now).await;
                }
                4 if !made.is_empty() => {
                    let r = &made[rng.gen_range(0..made.len())];
                    let to = if rng.gen_bool(0.7) {
                        ReservationStatus::Completed
                    } else {
                        ReservationStatus::NoShow
                    };
                    let _ = reservations::settle_reservation(state, r.id, to, now).await;
                }
                5 => {
                    let kg = Decimal::new(rng.gen_range(1..5000), 3);
                    waste(state, meal, kg, now + Duration::hours(rng.gen_range(0..30))).await;
                }
                _ => feedback(state, user, meal, rng.gen_range(1..=5), now).await,
            }
        }
        meals
    }

    async fn assert_paths_agree(state: &AppState) {
        let log = state.store.snapshot().await.expect("snapshot");
        let view = catch_up(state).await.expect("catch up");
        let today = date!(2025-10-06);

        for (start, end) in [
            (None, None),
            (Some(date!(2025-10-02)), Some(date!(2025-10-03))),
            (Some(date!(2025-10-04)), None),
            (None, Some(date!(2025-09-30))),
        ] {
            assert_eq!(view.meal_stats(start, end), full::meal_stats(&log, start, end));
        }
        for days in [0, 1, 7, 30] {
            assert_eq!(view.waste_trend(days, today), full::waste_trend(&log, days, today));
        }
        assert_eq!(view.leaderboard(100), full::leaderboard(&log, 100));
        assert_eq!(view.leaderboard(3), full::leaderboard(&log, 3));
        assert_eq!(view.dashboard(today), full::dashboard(&log, today));
    }

    #[tokio::test]
    async fn incremental_matches_full_recompute() {
        for (seed, cancellation) in [
            (7, CancellationPolicy::default()),
            (
                11,
                CancellationPolicy {
                    release_capacity: true,
                    retract_points: true,
                },
            ),
        ] {
            let state = materialized(cancellation);
            random_workload(&state, seed).await;
            assert_paths_agree(&state).await;
            // a second batch folds on top of the first
            random_workload(&state, seed + 1).await;
            assert_paths_agree(&state).await;
        }
    }

    #[tokio::test]
    async fn capacity_is_conserved() {
        for release_capacity in [false, true] {
            let state = materialized(CancellationPolicy {
                release_capacity,
                retract_points: false,
            });
            let meals = random_workload(&state, 42).await;
            for meal in meals {
                let now = state.store.get_schedule(meal.id).await.expect("meal");
                let holding = state
                    .store
                    .list_schedule_reservations(meal.id)
                    .await
                    .expect("reservations");
                for size in SIZES {
                    let held = holding
                        .iter()
                        .filter(|r| r.portion_size == size && r.holds_capacity())
                        .count() as i32;
                    assert_eq!(now.remaining(size) + held, now.capacity(size), "{size}");
                }
            }
        }
    }

    #[tokio::test]
    async fn leaderboard_breaks_point_ties_on_confirmations() {
        let state = AppState::fake();
        let day = date!(2025-10-01);
        let meals = [
            schedule(&state, day, MealType::Breakfast, 5).await,
            schedule(&state, day, MealType::Lunch, 5).await,
            schedule(&state, day, MealType::Dinner, 5).await,
        ];
        let now = datetime!(2025-10-01 08:00 UTC);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        // A: small + large + one feedback = 10 points, 2 confirmed, 1 small
        reservations::create_reservation(&state, a, meals[0].id, PortionSize::Small, now)
            .await
            .expect("a1");
        reservations::create_reservation(&state, a, meals[1].id, PortionSize::Large, now)
            .await
            .expect("a2");
        feedback(&state, a, &meals[0], 4, now).await;
        // B: three large + two feedbacks = 10 points, 3 confirmed, 0 small
        for meal in &meals {
            reservations::create_reservation(&state, b, meal.id, PortionSize::Large, now)
                .await
                .expect("b");
        }
        feedback(&state, b, &meals[1], 3, now).await;
        feedback(&state, b, &meals[2], 5, now).await;

        let board = leaderboard(&state, 10).await.expect("leaderboard");
        let rows: Vec<_> = board
            .iter()
            .map(|e| (e.rank, e.user_id, e.eco_points, e.confirmed_count, e.small_count))
            .collect();
        assert_eq!(rows, vec![(1, b, 10, 3, 0), (2, a, 10, 2, 1)]);
    }

    #[tokio::test]
    async fn waste_trend_is_dense() {
        for state in [AppState::fake(), materialized(CancellationPolicy::default())] {
            let day1 = date!(2025-10-01);
            let day4 = date!(2025-10-04);
            let lunch = schedule(&state, day1, MealType::Lunch, 1).await;
            let dinner = schedule(&state, day4, MealType::Dinner, 1).await;
            waste(&state, &lunch, Decimal::new(2500, 3), datetime!(2025-10-01 14:00 UTC)).await;
            waste(&state, &dinner, Decimal::new(1200, 3), datetime!(2025-10-04 21:00 UTC)).await;
            waste(&state, &lunch, Decimal::new(300, 3), datetime!(2025-10-04 09:00 UTC)).await;

            let trend = waste_trend(&state, 7, date!(2025-10-07)).await.expect("trend");
            assert_eq!(trend.len(), 7);
            assert_eq!(trend[0].date, day1);
            assert_eq!(trend.iter().filter(|d| d.total_kg.is_zero()).count(), 5);
            assert_eq!(trend[0].total_kg, Decimal::new(25, 1));
            assert_eq!(trend[3].total_kg, Decimal::new(15, 1));
            assert_eq!(trend[3].by_meal_type[&MealType::Dinner], Decimal::new(12, 1));
            assert_eq!(trend[3].by_meal_type[&MealType::Lunch], Decimal::new(3, 1));
            assert_eq!(trend[3].by_meal_type[&MealType::Snack], Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn meal_stats_report_missing_ratings_as_null() {
        let state = AppState::fake();
        let day = date!(2025-10-02);
        let breakfast = schedule(&state, day, MealType::Breakfast, 2).await;
        let dinner = schedule(&state, day, MealType::Dinner, 2).await;
        let now = datetime!(2025-10-02 07:00 UTC);
        let u = Uuid::new_v4();
        reservations::create_reservation(&state, u, breakfast.id, PortionSize::Small, now)
            .await
            .expect("reserve");
        let r = reservations::create_reservation(&state, u, dinner.id, PortionSize::Medium, now)
            .await
            .expect("reserve");
        reservations::settle_reservation(&state, r.id, ReservationStatus::NoShow, now)
            .await
            .expect("settle");
        feedback(&state, u, &breakfast, 4, now).await;
        feedback(&state, u, &breakfast, 5, now).await;

        let stats = meal_stats(&state, Some(day), Some(day)).await.expect("stats");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].meal_type, MealType::Breakfast);
        assert_eq!((stats[0].total_confirmations, stats[0].small_count), (1, 1));
        assert_eq!(stats[0].avg_rating, Some(4.5));
        assert_eq!(stats[1].meal_type, MealType::Dinner);
        assert_eq!(stats[1].total_confirmations, 0);
        assert_eq!(stats[1].avg_rating, None);

        assert!(meal_stats(&state, Some(date!(2025-10-03)), Some(day)).await.is_err());
    }

    #[tokio::test]
    async fn dashboard_summarises_the_last_week() {
        let state = AppState::fake();
        let today = date!(2025-10-10);
        let old = schedule(&state, date!(2025-09-20), MealType::Lunch, 1).await;
        let recent = schedule(&state, date!(2025-10-08), MealType::Lunch, 1).await;
        let u = Uuid::new_v4();
        waste(&state, &old, Decimal::new(9, 0), datetime!(2025-09-20 15:00 UTC)).await;
        waste(&state, &recent, Decimal::new(1750, 3), datetime!(2025-10-08 15:00 UTC)).await;
        feedback(&state, u, &old, 1, datetime!(2025-09-20 15:00 UTC)).await;
        feedback(&state, u, &recent, 4, datetime!(2025-10-08 15:00 UTC)).await;
        feedback(&state, u, &recent, 5, datetime!(2025-10-09 15:00 UTC)).await;
        feedback(&state, u, &recent, 4, datetime!(2025-10-09 16:00 UTC)).await;

        let d = dashboard(&state, today).await.expect("dashboard");
        assert_eq!(d.period_start, date!(2025-10-03));
        assert_eq!(d.total_waste_kg, Decimal::new(175, 2));
        assert_eq!(d.avg_rating, 4.3);
        assert_eq!(d.participants, 1);
        assert_eq!(d.week_stats.len(), 1);
        assert_eq!(d.week_stats[0].avg_rating, Some(13.0 / 3.0));
    }

    #[tokio::test]
    async fn participants_include_anyone_with_a_balance() {
        for state in [AppState::fake(), materialized(CancellationPolicy::default())] {
            let today = date!(2025-10-10);
            let meal = schedule(&state, date!(2025-10-09), MealType::Dinner, 2).await;
            let deadline = meal.confirmation_deadline;
            let (large_only, rater) = (Uuid::new_v4(), Uuid::new_v4());
            reservations::create_reservation(
                &state,
                large_only,
                meal.id,
                PortionSize::Large,
                deadline - Duration::hours(1),
            )
            .await
            .expect("reserve");
            feedback(&state, rater, &meal, 3, datetime!(2025-10-09 20:00 UTC)).await;

            let d = dashboard(&state, today).await.expect("dashboard");
            assert_eq!(d.participants, 2);
        }
    }
}

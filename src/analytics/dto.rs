use serde::Deserialize;
use time::Date;

#[derive(Debug, Default, Deserialize)]
pub struct MealStatsQuery {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct WasteTrendQuery {
    #[serde(default = "default_days")]
    pub days: u32,
    /// Last day of the window, defaults to the current UTC date.
    pub today: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub today: Option<Date>,
}

fn default_days() -> u32 {
    7
}

fn default_limit() -> usize {
    10
}

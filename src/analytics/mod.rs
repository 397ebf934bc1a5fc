//! Meal stats, waste trend, leaderboard and dashboard over the event stream.

mod dto;
pub mod full;
pub mod handlers;
pub mod incremental;
pub mod services;
pub mod views;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

use std::time::Duration;

use anyhow::{bail, Context};

use crate::{reservations::machine::CancellationPolicy, retry::RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsMode {
    /// Full recompute over a snapshot per request.
    OnDemand,
    /// Folded incrementally from the journal.
    Materialized,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub analytics_mode: AnalyticsMode,
    pub retry: RetryPolicy,
    pub cancellation: CancellationPolicy,
    pub notify_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => bail!("unknown STORE_BACKEND {other:?}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL is required for the postgres backend");
        }

        let analytics_mode = match std::env::var("ANALYTICS_MODE").as_deref() {
            Ok("materialized") => AnalyticsMode::Materialized,
            Ok("on_demand") | Err(_) => AnalyticsMode::OnDemand,
            Ok(other) => bail!("unknown ANALYTICS_MODE {other:?}"),
        };

        let retry = RetryPolicy {
            max_attempts: env_parse("RETRY_MAX_ATTEMPTS")?.unwrap_or(3),
            base_delay: Duration::from_millis(env_parse("RETRY_BASE_DELAY_MS")?.unwrap_or(20)),
        };
        let cancellation = CancellationPolicy {
            release_capacity: env_parse("CANCEL_RELEASES_CAPACITY")?.unwrap_or(false),
            retract_points: env_parse("CANCEL_RETRACTS_POINTS")?.unwrap_or(false),
        };

        Ok(Self {
            database_url,
            store_backend,
            analytics_mode,
            retry,
            cancellation,
            notify_capacity: env_parse("NOTIFY_CHANNEL_CAPACITY")?.unwrap_or(256),
        })
    }

    /// In-memory configuration with default policies.
    pub fn memory() -> Self {
        Self {
            database_url: None,
            store_backend: StoreBackend::Memory,
            analytics_mode: AnalyticsMode::OnDemand,
            retry: RetryPolicy::default(),
            cancellation: CancellationPolicy::default(),
            notify_capacity: 256,
        }
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid {key}")),
        Err(_) => Ok(None),
    }
}

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use crate::{
    analytics::incremental::Materialized,
    config::{AppConfig, StoreBackend},
    notify::Notifier,
    storage::{memory::MemoryStore, postgres::PgStore, Store},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
    pub materialized: Arc<Mutex<Materialized>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to postgres")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgStore::new(db)) as Arc<dyn Store>
            }
            StoreBackend::Memory => {
                tracing::warn!("using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        let notifier = Notifier::new(config.notify_capacity);
        Self {
            config,
            store,
            notifier,
            materialized: Arc::new(Mutex::new(Materialized::default())),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(AppConfig::memory())
    }

    #[cfg(test)]
    pub fn fake_with(config: AppConfig) -> Self {
        Self::from_parts(Arc::new(config), Arc::new(MemoryStore::new()))
    }
}

use crate::config::AppConfig;
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        Ok(Self { db, config })
    }

    /// Builds state around an existing pool. The test harness passes its
    /// per-test session here in place of the production pool.
    pub fn from_parts(db: PgPool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// State whose pool never connects until first use.
    pub fn lazy(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .context("build lazy pool")?;
        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }
}

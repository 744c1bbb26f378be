use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, StoreState};

#[derive(Clone)]
pub struct AppState {
    pub store: StoreState,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the state from the environment. Postgres migrations run here so
    /// the memory store path never touches sqlx.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: StoreState = if config.uses_memory_store() {
            tracing::warn!("DATABASE_URL=memory://, records will not survive a restart");
            Arc::new(MemoryStore::new())
        } else {
            let pg = PgStore::connect(&config.database_url, config.max_connections).await?;
            sqlx::migrate!("./migrations")
                .run(pg.pool())
                .await
                .context("run migrations")?;
            Arc::new(pg)
        };

        Ok(Self { store, config })
    }

    pub fn from_parts(store: StoreState, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }
}

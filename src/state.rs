use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::{AppConfig, JwtConfig};
use crate::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Production state: config from the environment, Postgres-backed store.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        Ok(Self {
            store: Arc::new(PgLedgerStore::new(pool)),
            config,
        })
    }

    pub fn from_parts(store: Arc<dyn LedgerStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// State over the in-memory store with a fixed config. Used by tests;
    /// nothing here touches the environment or the network.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "postgres://localhost/unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 45,
            },
        });
        Self::from_parts(Arc::new(MemoryLedgerStore::new()), config)
    }
}

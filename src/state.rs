use crate::config::{AppConfig, StoreBackend};
use crate::db;
use crate::remote::RemoteUserGateway;
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore, UserSyncController};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub users: UserSyncController,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn UserStore> = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                Arc::new(PgUserStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory user store; records are lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        let gateway = Arc::new(RemoteUserGateway::new(
            &config.remote.users_url,
            config.remote.timeout_secs.map(Duration::from_secs),
        )?);
        tracing::info!(remote = %gateway.users_url(), store = ?config.store, "state ready");

        Ok(Self {
            users: UserSyncController::new(store, gateway),
        })
    }

    /// State over the given store, talking to `users_url`.
    #[cfg(test)]
    pub fn fake(store: Arc<dyn UserStore>, users_url: &str) -> Self {
        let gateway = Arc::new(
            RemoteUserGateway::new(users_url, Some(Duration::from_secs(5))).expect("gateway ok"),
        );
        Self {
            users: UserSyncController::new(store, gateway),
        }
    }
}

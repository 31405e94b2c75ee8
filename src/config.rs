use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_REMOTE_USERS_URL: &str = "https://jsonplaceholder.typicode.com/users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown USER_STORE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub users_url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub remote: RemoteConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("USER_STORE") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when USER_STORE=postgres");
        }

        let timeout_secs = match std::env::var("REMOTE_TIMEOUT_SECS") {
            Ok(v) => Some(
                v.parse::<u64>()
                    .with_context(|| format!("REMOTE_TIMEOUT_SECS is not a number: {v}"))?,
            ),
            Err(_) => None,
        };
        let remote = RemoteConfig {
            users_url: std::env::var("REMOTE_USERS_URL")
                .unwrap_or_else(|_| DEFAULT_REMOTE_USERS_URL.into()),
            timeout_secs,
        };

        Ok(Self {
            store,
            database_url,
            remote,
        })
    }
}

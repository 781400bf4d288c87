//! Database primitives: settings, pool wiring and the account-backed
//! identity store.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::info;

mod store;

pub use store::DbIdentityStore;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error("failed to connect to database")]
    Connect(#[source] DbErr),
    #[error("failed to close database pool")]
    Close(#[source] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
        }
    }

    /// Reads the connection string from `env_key`.
    pub fn from_env(env_key: &str) -> DbResult<Self> {
        std::env::var(env_key)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(Self::new)
            .ok_or(DbError::MissingUrl)
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

/// Opens the pool. Fails fast when the database is unreachable.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .sqlx_logging(false);
    let pool = Database::connect(options).await.map_err(DbError::Connect)?;
    info!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}

pub async fn close(pool: DbPool) -> DbResult<()> {
    pool.close().await.map_err(DbError::Close)?;
    info!("database pool closed");
    Ok(())
}

use crate::domain::{DomainError, PoolStats};
use crate::postgres::PostgresConfig;
use anyhow::Result;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::debug;

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a new PostgreSQL client with connection pooling.
    ///
    /// Waiting for, creating and recycling a pooled connection are all bounded
    /// by `wait_timeout_secs`.
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        let timeout = Some(Duration::from_secs(config.wait_timeout_secs));

        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_pool_size);
        pool_config.timeouts = Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        };
        cfg.pool = Some(pool_config);

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client, PoolError> {
        self.pool.get().await
    }

    pub fn stat(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

/// Classifies a pool acquisition failure, keeping deadline expiry distinct
pub fn pool_error_to_domain(error: PoolError) -> DomainError {
    match error {
        PoolError::Timeout(kind) => {
            DomainError::Timeout(format!("waiting for database connection ({:?})", kind))
        }
        other => DomainError::ServerError(other.into()),
    }
}

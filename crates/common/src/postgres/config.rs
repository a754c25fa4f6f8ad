use serde::{Deserialize, Serialize};
use std::fmt;

/// PostgreSQL configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    /// Upper bound on waiting for a free pooled connection
    pub wait_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            max_pool_size: 10,
            wait_timeout_secs: 5,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_pool_size", &self.max_pool_size)
            .field("wait_timeout_secs", &self.wait_timeout_secs)
            .finish()
    }
}

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Pod identity, reported by /info
    #[serde(default = "default_pod_name")]
    pub pod_name: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deployment environment (dev, hml, prd)
    #[serde(default = "default_env")]
    pub env: String,

    #[serde(default = "default_availability_zone")]
    pub availability_zone: String,

    // HTTP server configuration
    #[serde(default = "default_server_host")]
    pub server_host: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Deadline for each service call made by a handler
    #[serde(default = "default_server_ctx_timeout_secs")]
    pub server_ctx_timeout_secs: u64,

    /// Upper bound on a whole request, body included
    #[serde(default = "default_server_read_timeout_secs")]
    pub server_read_timeout_secs: u64,

    /// Comma-separated path prefixes skipped by request logging and tracing
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Bound on waiting for a pooled connection
    #[serde(default = "default_postgres_wait_timeout_secs")]
    pub postgres_wait_timeout_secs: u64,

    // Object store configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(default = "default_nats_connect_timeout_secs")]
    pub nats_connect_timeout_secs: u64,

    /// Object store bucket every upload lands in
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Key prefix for uploads inside the bucket
    #[serde(default = "default_file_path")]
    pub file_path: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pod_name() -> String {
    "go-onboarding".to_string()
}

fn default_api_version() -> String {
    "0.1.0".to_string()
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_availability_zone() -> String {
    "-".to_string()
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_server_ctx_timeout_secs() -> u64 {
    5
}

fn default_server_read_timeout_secs() -> u64 {
    60
}

fn default_http_ignored_paths() -> String {
    "/health,/live".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "postgres".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_password() -> String {
    "postgres".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_wait_timeout_secs() -> u64 {
    5
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_connect_timeout_secs() -> u64 {
    10
}

fn default_bucket_name() -> String {
    "onboarding".to_string()
}

fn default_file_path() -> String {
    "uploads".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "go-onboarding".to_string()
}

// Hand-written so the database password never reaches the logs
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("pod_name", &self.pod_name)
            .field("api_version", &self.api_version)
            .field("env", &self.env)
            .field("availability_zone", &self.availability_zone)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("server_ctx_timeout_secs", &self.server_ctx_timeout_secs)
            .field("server_read_timeout_secs", &self.server_read_timeout_secs)
            .field("http_ignored_paths", &self.http_ignored_paths)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_password", &"<redacted>")
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .field("postgres_wait_timeout_secs", &self.postgres_wait_timeout_secs)
            .field("nats_url", &self.nats_url)
            .field("nats_connect_timeout_secs", &self.nats_connect_timeout_secs)
            .field("bucket_name", &self.bucket_name)
            .field("file_path", &self.file_path)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }
}

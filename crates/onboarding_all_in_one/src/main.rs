mod config;

use common::domain::ObjectStorageConfig;
use common::http::IgnoredPaths;
use common::nats::{NatsClient, NatsObjectStoreClient};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresPersonRepository, PostgresUnitOfWorkProvider,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use crate::config::ServiceConfig;
use onboarding_api::domain::{FileService, OnboardingService};
use onboarding_api::http::{AppState, HttpServerConfig, InfoPod, ServerInfo};
use onboarding_api::onboarding_api::OnboardingApi;
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DB_PING_ATTEMPTS: u32 = 3;
const DB_PING_INTERVAL: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        service_version: config.api_version.clone(),
        environment: config.env.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        pod_name = %config.pod_name,
        otel_enabled = config.otel_enabled,
        "Starting onboarding service"
    );
    debug!("Configuration: {:?}", config);

    let postgres_client = match connect_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let nats_client = match NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.nats_connect_timeout_secs),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize object store: {:#}", e);
            std::process::exit(1);
        }
    };

    let onboarding_service = Arc::new(OnboardingService::new(
        Arc::new(PostgresPersonRepository::new(postgres_client.clone())),
        Arc::new(PostgresUnitOfWorkProvider::new(postgres_client)),
    ));
    let file_service = Arc::new(FileService::new(
        Arc::new(NatsObjectStoreClient::new(nats_client.jetstream().clone())),
        ObjectStorageConfig {
            bucket_name: config.bucket_name.clone(),
            file_path: config.file_path.clone(),
        },
    ));

    let state = AppState {
        onboarding_service,
        file_service,
        info: Arc::new(build_info_pod(&config)),
        ctx_timeout: Duration::from_secs(config.server_ctx_timeout_secs),
    };
    let http_config = HttpServerConfig {
        host: config.server_host.clone(),
        port: config.server_port,
        read_timeout: Duration::from_secs(config.server_read_timeout_secs),
        ignored_paths: IgnoredPaths::from_comma_separated(&config.http_ignored_paths),
    };
    let onboarding_api = OnboardingApi::new(state, http_config);

    let runner = Runner::new()
        .with_named_process("onboarding_api", onboarding_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            if let Err(e) = nats_client.close().await {
                warn!("Failed to close NATS connection: {:#}", e);
            }

            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    if let Err(e) = runner.run().await {
        eprintln!("Onboarding service exiting with error: {:#}", e);
        std::process::exit(1);
    }
}

/// Builds the pool and waits for the database to answer a ping
async fn connect_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("Initializing PostgreSQL...");
    let client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
        wait_timeout_secs: config.postgres_wait_timeout_secs,
    })?;

    let mut attempt = 1;
    loop {
        match client.ping().await {
            Ok(()) => return Ok(client),
            Err(e) if attempt < DB_PING_ATTEMPTS => {
                warn!(attempt, error = %e, "database not reachable, retrying");
                tokio::time::sleep(DB_PING_INTERVAL).await;
                attempt += 1;
            }
            Err(e) => return Err(e.context("database not reachable")),
        }
    }
}

fn build_info_pod(config: &ServiceConfig) -> InfoPod {
    InfoPod {
        pod_name: config.pod_name.clone(),
        api_version: config.api_version.clone(),
        os_pid: std::process::id(),
        ip_address: local_ip_address(),
        availability_zone: config.availability_zone.clone(),
        env: config.env.clone(),
        server: ServerInfo {
            host: config.server_host.clone(),
            port: config.server_port,
            ctx_timeout_secs: config.server_ctx_timeout_secs,
            read_timeout_secs: config.server_read_timeout_secs,
        },
    }
}

/// Address of the interface holding the default route; nothing is sent
fn local_ip_address() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

//! Application entry point.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use starknet_balance_service::api::create_router;
use starknet_balance_service::app::{
    AppState, BalanceServiceConfig, SchedulerConfig, spawn_scheduler,
};
use starknet_balance_service::domain::Network;
use starknet_balance_service::infra::{
    InMemoryCacheStore, PostgresBalanceRepository, PostgresConfig, StarknetChainAdapter,
    StarknetConfig,
};

/// Application configuration
struct Config {
    database_url: String,
    chain_rpc_url: String,
    network: Network,
    host: String,
    port: u16,
    service_config: BalanceServiceConfig,
    scheduler_config: SchedulerConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let chain_rpc_url = env::var("STARKNET_RPC_URL")
            .unwrap_or_else(|_| "https://starknet-mainnet.public.blastapi.io".to_string());
        let network = env::var("STARKNET_NETWORK")
            .ok()
            .map(|value| Network::from_str(&value))
            .transpose()
            .map_err(|e| anyhow::anyhow!(e))?
            .unwrap_or_default();
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let service_config = BalanceServiceConfig {
            balance_ttl: duration_secs_from_env("BALANCE_CACHE_TTL_SECS", 300),
            token_info_ttl: duration_secs_from_env("TOKEN_INFO_CACHE_TTL_SECS", 24 * 60 * 60),
            max_retries: env_or("CHAIN_MAX_RETRIES", 3),
            initial_retry_delay: duration_millis_from_env("CHAIN_RETRY_INITIAL_DELAY_MS", 1000),
            max_retry_delay: duration_millis_from_env("CHAIN_RETRY_MAX_DELAY_MS", 10_000),
            ..Default::default()
        };

        let scheduler_config = SchedulerConfig {
            interval: duration_secs_from_env("SCHEDULER_INTERVAL_SECS", 3600),
            batch_size: env_or("SCHEDULER_BATCH_SIZE", 50),
            chunk_size: env_or("SCHEDULER_CHUNK_SIZE", 10),
            chunk_delay: duration_millis_from_env("SCHEDULER_CHUNK_DELAY_MS", 2000),
            enabled: env::var("ENABLE_SCHEDULER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        };

        Ok(Self {
            database_url,
            chain_rpc_url,
            network,
            host,
            port,
            service_config,
            scheduler_config,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn duration_secs_from_env(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default))
}

fn duration_millis_from_env(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_or(key, default))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!(
        "Starknet Balance Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    info!("Initializing infrastructure...");

    let repository =
        PostgresBalanceRepository::new(&config.database_url, PostgresConfig::default()).await?;
    repository.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");

    let cache = Arc::new(InMemoryCacheStore::new());
    info!("   ✓ In-memory cache store ready");

    let chain = StarknetChainAdapter::new(StarknetConfig::new(&config.chain_rpc_url, config.network))?;
    info!(network = %config.network, "   ✓ Chain adapter created");

    let state = Arc::new(AppState::with_config(
        Arc::new(chain),
        cache,
        Arc::new(repository),
        config.service_config.clone(),
        config.scheduler_config.clone(),
    ));

    let scheduler_shutdown_tx = if config.scheduler_config.enabled {
        let (_handle, shutdown_tx) = spawn_scheduler(Arc::clone(&state.reconciliation));
        info!(
            interval_secs = config.scheduler_config.interval.as_secs(),
            batch_size = config.scheduler_config.batch_size,
            "   ✓ Reconciliation scheduler started"
        );
        Some(shutdown_tx)
    } else {
        info!("   ○ Reconciliation scheduler disabled");
        None
    };

    let router = create_router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server starting on http://{}", addr);
    info!("📖 Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(tx) = scheduler_shutdown_tx {
        let _ = tx.send(true);
    }

    info!("Server shutdown complete");
    Ok(())
}

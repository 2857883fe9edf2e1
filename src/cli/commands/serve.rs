use anyhow::{bail, Context};
use clap::Args;
use tracing::{info, warn};

use crate::app::{router, AppState};
use crate::auth::TokenVerifier;
use crate::config;
use crate::database::DatabaseManager;
use crate::services::spawn_retention_sweep;

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (overrides PORT)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config::config();
    info!("Starting admin realtime in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        if crate::is_production!() {
            bail!("JWT_SECRET must be set in production");
        }
        warn!("JWT_SECRET is not set; every AUTH frame and REST call will be rejected");
    }

    let store = DatabaseManager::open_store(&config.database, &config.realtime)
        .await
        .context("failed to open chat store")?;

    let verifier = TokenVerifier::new(&config.security.jwt_secret, config.security.jwt_expiry_hours);
    let state = AppState::new(store.clone(), verifier, &config.realtime);

    let heartbeat = state
        .presence
        .clone()
        .spawn_heartbeat(config.realtime.heartbeat_interval());
    let retention = spawn_retention_sweep(
        store,
        config.realtime.message_ttl(),
        config.realtime.retention_sweep_interval(),
    );

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Admin realtime listening on http://{} (socket at /ws)", bind_addr);

    let served = axum::serve(listener, router(state, &config.security))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    heartbeat.abort();
    retention.abort();
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

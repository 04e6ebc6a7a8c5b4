//! incident-intel -- simulated alerts, error trends and probable-cause clusters.
//!
//! This crate provides the incident store, the analysis worker integration,
//! the simulate-alert pipeline and the HTTP API that serves a dashboard.

pub mod analysis;
pub mod api;
pub mod config;
pub mod incident;
pub mod scenario;
pub mod simulate;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::analysis::ProcessRunner;
use crate::api::origin::OriginPolicy;
use crate::config::AppConfig;
use crate::simulate::Simulator;
use crate::storage::IncidentStore;

/// Open the configured store and wire it to the configured worker.
///
/// The store must exist and be readable; this is checked up front so a bad
/// deployment fails at startup rather than on the first request.
pub async fn build_simulator(config: &AppConfig) -> Result<Simulator> {
    let backend = storage::open_backend(&config.storage).with_context(|| {
        format!(
            "incident store cannot initialize (run `incident-intel init-store` to create {})",
            config.storage.path.display()
        )
    })?;
    let store = Arc::new(IncidentStore::from_arc(backend));
    let snapshot = store
        .snapshot()
        .await
        .with_context(|| format!("failed to read incident store {}", store.describe()))?;
    tracing::info!(store = %store.describe(), incidents = snapshot.incidents.len(), "incident store ready");

    let runner = ProcessRunner::from_config(&config.worker);
    tracing::info!(
        program = %config.worker.program,
        args = ?config.worker.args,
        working_dir = ?config.worker.working_dir,
        timeout_secs = config.worker.timeout_secs,
        "analysis worker configured"
    );
    Ok(Simulator::new(store, Arc::new(runner)))
}

/// Start the incident-intel API server.
pub async fn serve(config: AppConfig) -> Result<()> {
    let simulator = build_simulator(&config).await?;
    let policy = OriginPolicy::new(&config.server.cors_origins);
    let app = api::router(api::state::AppState::new(simulator), policy);

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;

    tracing::info!(%addr, "incident-intel listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("incident-intel stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

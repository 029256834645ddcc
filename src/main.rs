use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use tracing::{error, info};

use workload_reloader::observability::metrics;
use workload_reloader::options::Options;
use workload_reloader::reload::Reloader;
use workload_reloader::server::{start_server, ServerState};
use workload_reloader::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workload_reloader=info".into()),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        "Starting Workload Reloader"
    );

    metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    let server_state_clone = Arc::clone(&server_state);
    let server_port = options.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let engine = Arc::new(Reloader::new(client, options));

    server_state.is_ready.store(true, Ordering::Relaxed);

    let configmaps = watch::start_configmap_watch(Arc::clone(&engine));
    let secrets = watch::start_secret_watch(Arc::clone(&engine));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        _ = configmaps => error!("ConfigMap watch task exited"),
        _ = secrets => error!("Secret watch task exited"),
    }

    info!("Controller stopped");
    Ok(())
}

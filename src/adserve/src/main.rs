//! AdServe: serves one ad per publisher request from periodically refreshed,
//! revenue-weighted allocation snapshots.

use adserve_allocation::{Sampler, SnapshotHandle};
use adserve_api::ApiServer;
use adserve_core::config::AppConfig;
use adserve_refresh::RefreshLoop;
use adserve_sources::{PanelClient, ReporterClient};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "adserve")]
#[command(about = "Confidence-gated, revenue-weighted ad allocation and serving")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "ADSERVE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "ADSERVE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Seconds between allocation refreshes (overrides config)
    #[arg(long, env = "ADSERVE__ALLOCATION__REFRESH_INTERVAL_SECS")]
    refresh_interval_secs: Option<u64>,

    /// Base URL of the statistics reporter (overrides config)
    #[arg(long, env = "ADSERVE__REPORTER__BASE_URL")]
    reporter_url: Option<String>,

    /// Base URL of the campaign panel (overrides config)
    #[arg(long, env = "ADSERVE__PANEL__BASE_URL")]
    panel_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adserve=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("AdServe starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(secs) = cli.refresh_interval_secs {
        config.allocation.refresh_interval_secs = secs;
    }
    if let Some(url) = cli.reporter_url {
        config.reporter.base_url = url;
    }
    if let Some(url) = cli.panel_url {
        config.panel.base_url = url;
    }
    config.validate()?;

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        refresh_interval_secs = config.allocation.refresh_interval_secs,
        reporter = %config.reporter.base_url,
        panel = %config.panel.base_url,
        "Configuration loaded"
    );

    let reporter = Arc::new(ReporterClient::new(&config.reporter)?);
    let panel = Arc::new(PanelClient::new(&config.panel)?);
    let snapshots = Arc::new(SnapshotHandle::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let refresh = Arc::new(RefreshLoop::new(
        &config.allocation,
        reporter,
        panel,
        snapshots.clone(),
    ));
    let refresh_handle = refresh.spawn(shutdown_rx);

    let api_server = ApiServer::new(config.clone(), Sampler::new(snapshots));

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signal");
                // keep the sender alive so serving continues
                std::future::pending::<()>().await;
            }
        }
        let _ = signal_tx.send(true);
    });

    info!("AdServe is ready to serve traffic");

    // Blocks until shutdown
    let served = serve_until_stopped(&api_server, &shutdown_tx, refresh_handle).await;
    info!("AdServe stopped");

    served
}

/// Run the HTTP server, then stop the refresh loop and wait for it. The loop
/// is signalled however the server ends, including a failed bind.
async fn serve_until_stopped(
    api_server: &ApiServer,
    shutdown_tx: &watch::Sender<bool>,
    refresh_handle: JoinHandle<()>,
) -> anyhow::Result<()> {
    let served = api_server.start_http(shutdown_tx.subscribe()).await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP server failed");
    }

    shutdown_tx.send_replace(true);
    if let Err(e) = refresh_handle.await {
        error!(error = %e, "Refresh loop task failed");
    }

    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_bind_failure_stops_refresh_loop() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut config = AppConfig::default();
        config.api.host = "127.0.0.1".to_string();
        config.api.http_port = port;
        config.metrics.enabled = false;
        // nothing listens on the discard port
        config.reporter.base_url = "http://127.0.0.1:9".to_string();
        config.reporter.timeout_ms = 200;
        config.panel.base_url = "http://127.0.0.1:9".to_string();
        config.panel.timeout_ms = 200;

        let snapshots = Arc::new(SnapshotHandle::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let refresh = Arc::new(RefreshLoop::new(
            &config.allocation,
            Arc::new(ReporterClient::new(&config.reporter).unwrap()),
            Arc::new(PanelClient::new(&config.panel).unwrap()),
            snapshots.clone(),
        ));
        let refresh_handle = refresh.spawn(shutdown_rx);
        let api_server = ApiServer::new(config, Sampler::new(snapshots));

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until_stopped(&api_server, &shutdown_tx, refresh_handle),
        )
        .await
        .expect("returns once the bind fails");

        assert!(served.is_err());
        assert!(*shutdown_tx.borrow());
        drop(taken);
    }
}

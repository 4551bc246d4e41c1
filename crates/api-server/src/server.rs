//! API server: the REST serve surface plus the Prometheus exporter.

use crate::rest::{self, AppState};
use adserve_allocation::Sampler;
use adserve_core::config::AppConfig;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    sampler: Sampler,
}

impl ApiServer {
    pub fn new(config: AppConfig, sampler: Sampler) -> Self {
        Self { config, sampler }
    }

    /// Build the router with all routes and middleware attached.
    pub fn router(&self) -> Router {
        build_router(AppState {
            sampler: self.sampler.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        })
    }

    /// Start the HTTP server. Returns once `shutdown` flips to `true` and
    /// in-flight requests have drained.
    pub async fn start_http(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.router();
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // a dropped sender also ends serving
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Serving
        .route("/new-ad", get(rest::handle_new_ad))
        .route("/v1/allocation/:publisher", get(rest::handle_allocation))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .route("/api-docs/openapi.json", get(rest::openapi_json))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

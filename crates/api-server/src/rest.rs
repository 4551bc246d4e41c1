//! REST handlers for ad serving, snapshot inspection and operational probes.

use adserve_allocation::{Sampler, ServeError};
use adserve_core::types::{Ad, AdCollaboration, AdId, PublisherId};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub sampler: Sampler,
    pub node_id: String,
    pub start_time: Instant,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn serve_error(err: ServeError) -> ApiError {
    let (status, code) = match err {
        ServeError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable"),
        ServeError::NoAdAvailable(_) => (StatusCode::NOT_FOUND, "no_ad_available"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: err.to_string(),
        }),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NewAdQuery {
    /// Publisher requesting the ad.
    pub publisher: PublisherId,
}

/// GET /new-ad: draw one ad for a publisher.
#[utoipa::path(
    get,
    path = "/new-ad",
    tag = "Serving",
    params(NewAdQuery),
    responses(
        (status = 200, description = "Selected ad", body = Ad),
        (status = 404, description = "Publisher has no eligible ads", body = ErrorResponse),
        (status = 503, description = "No allocation published yet", body = ErrorResponse),
    )
)]
pub async fn handle_new_ad(
    State(state): State<AppState>,
    Query(query): Query<NewAdQuery>,
) -> Result<Json<Ad>, ApiError> {
    match state.sampler.serve(query.publisher) {
        Ok(ad) => {
            debug!(publisher_id = query.publisher, ad_id = ad.id, "Served ad");
            Ok(Json(ad))
        }
        Err(e) => Err(serve_error(e)),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WinnerView {
    pub ad_id: AdId,
    pub weight: f64,
    pub expected_revenue: f64,
    pub ctr: f64,
    pub impressions: u64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AllocationResponse {
    pub publisher_id: PublisherId,
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub candidates: usize,
    pub winners: Vec<WinnerView>,
}

/// GET /v1/allocation/{publisher}: winner set and weights in the active snapshot.
#[utoipa::path(
    get,
    path = "/v1/allocation/{publisher}",
    tag = "Allocation",
    params(("publisher" = u64, Path, description = "Publisher ID")),
    responses(
        (status = 200, description = "Active distribution", body = AllocationResponse),
        (status = 404, description = "Publisher has no eligible ads", body = ErrorResponse),
        (status = 503, description = "No allocation published yet", body = ErrorResponse),
    )
)]
pub async fn handle_allocation(
    State(state): State<AppState>,
    Path(publisher_id): Path<PublisherId>,
) -> Result<Json<AllocationResponse>, ApiError> {
    let snapshot = state
        .sampler
        .snapshots()
        .load()
        .ok_or_else(|| serve_error(ServeError::NotReady))?;
    let distribution = snapshot
        .distribution(publisher_id)
        .map_err(|_| serve_error(ServeError::NoAdAvailable(publisher_id)))?;

    let allocation = &snapshot.allocation;
    let winners = distribution
        .entries
        .iter()
        .map(|entry| {
            let key = AdCollaboration::new(entry.ad_id, publisher_id);
            let stats = allocation.ad_stats.get(&key).copied().unwrap_or_default();
            let bounds = allocation.bounds.get(&key).copied().unwrap_or_default();
            WinnerView {
                ad_id: entry.ad_id,
                weight: entry.weight,
                expected_revenue: allocation.revenue.get(&key).copied().unwrap_or(0.0),
                ctr: stats.ctr,
                impressions: stats.impressions,
                lower_bound: bounds.lower_bound,
                upper_bound: bounds.upper_bound,
            }
        })
        .collect();

    Ok(Json(AllocationResponse {
        publisher_id,
        generation: snapshot.generation,
        published_at: snapshot.published_at,
        candidates: snapshot.catalog.ads.len(),
        winners,
    }))
}

/// GET /health: health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        snapshot_generation: state.sampler.snapshots().generation(),
    })
}

/// GET /ready: readiness probe. 200 once a snapshot has been published.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Serving from a published snapshot"),
        (status = 503, description = "Waiting for the first refresh"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.sampler.snapshots().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live: liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub snapshot_generation: u64,
}

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(crate::swagger::ApiDoc::openapi())
}

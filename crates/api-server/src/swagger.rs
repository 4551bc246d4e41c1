//! OpenAPI specification for the serve surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AdServe API",
        version = "0.1.0",
        description = "Serves one ad per publisher request from revenue-weighted, confidence-gated distributions.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Serving", description = "Ad selection endpoints"),
        (name = "Allocation", description = "Inspection of the active allocation snapshot"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        crate::rest::handle_new_ad,
        crate::rest::handle_allocation,
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        adserve_core::types::Ad,
        crate::rest::AllocationResponse,
        crate::rest::WinnerView,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;

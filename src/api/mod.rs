//! HTTP surface: session extractors, DTOs, handlers, SSE delivery, and
//! router composition.

pub mod auth;
pub mod dto;
pub mod handlers;
pub mod sse;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI documentation for the REST endpoints. The two SSE streams
/// are not described here.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ride-gateway",
        version = "0.1.0",
        description = "REST API and SSE gateway for a chair ride-dispatch service.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Initialization and internal triggers"),
        (name = "App", description = "Rider surface"),
        (name = "Chair", description = "Chair surface"),
        (name = "Owner", description = "Fleet-owner surface"),
    ),
    paths(
        handlers::system::post_initialize,
        handlers::app::post_users,
        handlers::app::post_payment_methods,
        handlers::app::get_rides,
        handlers::app::post_rides,
        handlers::app::post_rides_estimated_fare,
        handlers::app::post_ride_evaluation,
        handlers::app::get_nearby_chairs,
        handlers::chair::post_chairs,
        handlers::chair::post_activity,
        handlers::chair::post_coordinate,
        handlers::chair::post_ride_status,
        handlers::owner::post_owners,
        handlers::owner::get_sales,
        handlers::owner::get_chairs,
    ),
    components(schemas(
        crate::domain::Coordinate,
        crate::error::ErrorMessage,
        dto::RegisterUserRequest,
        dto::RegisterUserResponse,
        dto::RegisterPaymentMethodRequest,
        dto::RideHistoryResponse,
        dto::RideHistoryItem,
        dto::RideHistoryChair,
        dto::CreateRideRequest,
        dto::CreateRideResponse,
        dto::EstimatedFareRequest,
        dto::EstimatedFareResponse,
        dto::RideEvaluationRequest,
        dto::RideEvaluationResponse,
        dto::NearbyChairsResponse,
        dto::NearbyChair,
        dto::RegisterChairRequest,
        dto::RegisterChairResponse,
        dto::ChairActivityRequest,
        dto::ChairCoordinateResponse,
        dto::ChairRideStatusRequest,
        dto::RegisterOwnerRequest,
        dto::RegisterOwnerResponse,
        dto::SalesResponse,
        dto::ChairSales,
        dto::ModelSales,
        dto::OwnerChairsResponse,
        dto::OwnerChair,
        dto::InitializeRequest,
        dto::InitializeResponse,
    ))
)]
#[derive(Debug)]
pub struct ApiDoc;

/// Builds the complete API router with all endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/app", handlers::app::routes())
        .nest("/api/chair", handlers::chair::routes())
        .nest("/api/owner", handlers::owner::routes())
        .merge(handlers::system::routes())
}

//! Initialization and internal endpoints.

use std::collections::HashMap;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;

use crate::api::dto::{InitializeRequest, InitializeResponse};
use crate::app_state::AppState;
use crate::domain::{ChairId, Coordinate};
use crate::error::{ErrorMessage, GatewayError};
use crate::persistence::models::ChairLocation;

/// `POST /api/initialize` — Reset the process for a fresh data set.
///
/// Rewrites the payment gateway URL, recomputes the cumulative chair
/// distances from the full location log, rebuilds every cache, drops
/// all notification queues, and signals the dispatcher to reload its
/// working sets.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
#[utoipa::path(
    post,
    path = "/api/initialize",
    tag = "System",
    summary = "Re-initialize the service",
    request_body = InitializeRequest,
    responses(
        (status = 200, description = "Service re-initialized", body = InitializeResponse),
        (status = 500, description = "Re-initialization failed", body = ErrorMessage),
    )
)]
pub async fn post_initialize(
    State(state): State<AppState>,
    Json(req): Json<InitializeRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    sqlx::query("UPDATE settings SET value = ? WHERE name = 'payment_gateway_url'")
        .bind(&req.payment_server)
        .execute(&state.pool)
        .await?;

    recompute_total_distances(&state).await?;

    state.cache.hydrate(&state.pool).await?;
    state.hub.clear_all().await;
    state.dispatcher.reload().await;

    tracing::info!(payment_server = %req.payment_server, "service re-initialized");
    Ok(Json(InitializeResponse { language: "rust" }))
}

/// Rebuilds `chair_locations_total_distance` from the location log.
///
/// Idempotent: the table is truncated and refilled with the fold of
/// Manhattan deltas between consecutive reports per chair.
async fn recompute_total_distances(state: &AppState) -> Result<(), GatewayError> {
    let locations =
        sqlx::query_as::<_, ChairLocation>("SELECT * FROM chair_locations ORDER BY created_at")
            .fetch_all(&state.pool)
            .await?;

    let mut totals: HashMap<ChairId, i64> = HashMap::new();
    let mut previous: HashMap<ChairId, Coordinate> = HashMap::new();
    for location in locations {
        let point = location.coordinate();
        if let Some(prev) = previous.insert(location.chair_id.clone(), point) {
            *totals.entry(location.chair_id).or_insert(0) += i64::from(prev.distance_to(point));
        }
    }

    let mut tx = state.pool.begin().await?;
    sqlx::query("TRUNCATE TABLE chair_locations_total_distance")
        .execute(&mut *tx)
        .await?;
    for (chair_id, total_distance) in totals {
        sqlx::query(
            "INSERT INTO chair_locations_total_distance (chair_id, total_distance) VALUES (?, ?)",
        )
        .bind(&chair_id)
        .bind(total_distance)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// `GET /api/internal/matching` — Legacy matching trigger.
///
/// The dispatcher runs autonomously; the endpoint stays for the
/// harness and answers 204 without doing anything.
pub async fn get_matching() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// System routes, mounted at the API root.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/initialize", post(post_initialize))
        .route("/api/internal/matching", get(get_matching))
}

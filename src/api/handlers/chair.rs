//! Chair-surface handlers: registration, activity, coordinate reports,
//! chair-driven status transitions, and the notification stream.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use chrono::Utc;

use super::publish_ride_transition;
use crate::api::auth::{self, SessionChair};
use crate::api::dto::{
    ChairActivityRequest, ChairCoordinateResponse, ChairRideStatusRequest, RegisterChairRequest,
    RegisterChairResponse,
};
use crate::api::sse;
use crate::app_state::AppState;
use crate::domain::{ChairId, Coordinate, RideId, RideStatusKind};
use crate::error::{ErrorMessage, GatewayError};
use crate::persistence::models::{Chair, Owner, Ride};
use crate::persistence::queries;

/// `POST /api/chair/chairs` — Register a chair into a fleet.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] on missing fields,
/// [`GatewayError::Unauthorized`] for an unknown register token.
#[utoipa::path(
    post,
    path = "/api/chair/chairs",
    tag = "Chair",
    summary = "Register a chair",
    request_body = RegisterChairRequest,
    responses(
        (status = 201, description = "Chair registered", body = RegisterChairResponse),
        (status = 400, description = "Missing fields", body = ErrorMessage),
        (status = 401, description = "Unknown chair_register_token", body = ErrorMessage),
    )
)]
pub async fn post_chairs(
    State(state): State<AppState>,
    Json(req): Json<RegisterChairRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.name.is_empty() || req.model.is_empty() || req.chair_register_token.is_empty() {
        return Err(GatewayError::Validation(
            "some of required fields(name, model, chair_register_token) are empty".to_owned(),
        ));
    }

    let owner =
        sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE chair_register_token = ?")
            .bind(&req.chair_register_token)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(GatewayError::Unauthorized("invalid chair_register_token"))?;

    let chair_id = ChairId::generate();
    let access_token = auth::mint_secret(32);
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO chairs (id, owner_id, name, model, is_active, access_token, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&chair_id)
    .bind(&owner.id)
    .bind(&req.name)
    .bind(&req.model)
    .bind(false)
    .bind(&access_token)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    state
        .cache
        .upsert_chair(Chair {
            id: chair_id.clone(),
            owner_id: owner.id.clone(),
            name: req.name,
            model: req.model,
            is_active: false,
            access_token: access_token.clone(),
            created_at: now,
            updated_at: now,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        [(
            header::SET_COOKIE,
            auth::session_cookie("chair_session", &access_token),
        )],
        Json(RegisterChairResponse {
            id: chair_id,
            owner_id: owner.id,
        }),
    ))
}

/// `POST /api/chair/activity` — Flip the chair's active flag.
///
/// Activation tells the dispatcher the chair is available.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
#[utoipa::path(
    post,
    path = "/api/chair/activity",
    tag = "Chair",
    summary = "Set chair activity",
    request_body = ChairActivityRequest,
    responses(
        (status = 204, description = "Activity updated"),
    )
)]
pub async fn post_activity(
    State(state): State<AppState>,
    SessionChair(chair): SessionChair,
    Json(req): Json<ChairActivityRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    sqlx::query("UPDATE chairs SET is_active = ? WHERE id = ?")
        .bind(req.is_active)
        .bind(&chair.id)
        .execute(&state.pool)
        .await?;

    let mut chair = chair;
    chair.is_active = req.is_active;
    chair.updated_at = Utc::now();
    let chair_id = chair.id.clone();
    state.cache.upsert_chair(chair).await;

    if req.is_active {
        state.dispatcher.chair_available(chair_id).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/chair/coordinate` — Report the chair's position.
///
/// Appends to the location log, advances the cumulative distance, and
/// fires the location-triggered transitions: PICKUP when the report
/// equals the ride's pickup in state ENROUTE, ARRIVED when it equals
/// the destination in state CARRYING. Any other report only records
/// the position.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
#[utoipa::path(
    post,
    path = "/api/chair/coordinate",
    tag = "Chair",
    summary = "Report the chair position",
    request_body = Coordinate,
    responses(
        (status = 200, description = "Position recorded", body = ChairCoordinateResponse),
    )
)]
pub async fn post_coordinate(
    State(state): State<AppState>,
    SessionChair(chair): SessionChair,
    Json(coordinate): Json<Coordinate>,
) -> Result<impl IntoResponse, GatewayError> {
    let now = Utc::now();
    let previous = state.cache.chair_location(&chair.id).await;

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO chair_locations (id, chair_id, latitude, longitude, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&chair.id)
    .bind(coordinate.latitude)
    .bind(coordinate.longitude)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let mut delta = 0i64;
    if let Some(previous) = previous {
        delta = i64::from(previous.coordinate.distance_to(coordinate));
        sqlx::query(
            "INSERT INTO chair_locations_total_distance (chair_id, total_distance) \
             VALUES (?, ?) ON DUPLICATE KEY UPDATE total_distance = total_distance + ?",
        )
        .bind(&chair.id)
        .bind(delta)
        .bind(delta)
        .execute(&mut *tx)
        .await?;
    }

    // Location-triggered transitions on the chair's current ride.
    let mut transition: Option<(Ride, RideStatusKind)> = None;
    let ride = sqlx::query_as::<_, Ride>(
        "SELECT * FROM rides WHERE chair_id = ? ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(&chair.id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(ride) = ride {
        let status = queries::latest_ride_status(&mut *tx, &ride.id)
            .await?
            .ok_or_else(|| GatewayError::Internal("ride has no status log".to_owned()))?;
        if !status.is_terminal() {
            if coordinate == ride.pickup_coordinate() && status == RideStatusKind::Enroute {
                queries::insert_ride_status(&mut *tx, &ride.id, RideStatusKind::Pickup).await?;
                transition = Some((ride, RideStatusKind::Pickup));
            } else if coordinate == ride.destination_coordinate()
                && status == RideStatusKind::Carrying
            {
                queries::insert_ride_status(&mut *tx, &ride.id, RideStatusKind::Arrived).await?;
                transition = Some((ride, RideStatusKind::Arrived));
            }
        }
    }

    tx.commit().await?;

    state
        .cache
        .record_chair_location(&chair.id, coordinate, now)
        .await;
    if delta > 0 {
        state.cache.add_chair_distance(&chair.id, delta).await;
    }
    if let Some((ride, status)) = transition {
        state
            .cache
            .set_latest_ride_status(ride.id.clone(), status)
            .await;
        publish_ride_transition(&state, &ride, status).await;
    }

    Ok(Json(ChairCoordinateResponse {
        recorded_at: now.timestamp_millis(),
    }))
}

/// `GET /api/chair/notification` — The chair's SSE stream.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] if the connect-time replay fails.
pub async fn get_notification(
    State(state): State<AppState>,
    SessionChair(chair): SessionChair,
) -> Result<Response, GatewayError> {
    sse::chair_notification_stream(state, chair).await
}

/// `POST /api/chair/rides/{ride_id}/status` — Chair-driven transition.
///
/// ENROUTE acknowledges the assignment; CARRYING declares the rider on
/// board and is legal only from PICKUP. Everything else is rejected.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for a foreign ride, an illegal
/// transition, or an unknown status value;
/// [`GatewayError::NotFound`] for an unknown ride.
#[utoipa::path(
    post,
    path = "/api/chair/rides/{ride_id}/status",
    tag = "Chair",
    summary = "Advance the ride status",
    request_body = ChairRideStatusRequest,
    params(("ride_id" = String, Path, description = "Ride to advance")),
    responses(
        (status = 204, description = "Status appended"),
        (status = 400, description = "Illegal transition or status value", body = ErrorMessage),
        (status = 404, description = "Ride not found", body = ErrorMessage),
    )
)]
pub async fn post_ride_status(
    State(state): State<AppState>,
    SessionChair(chair): SessionChair,
    Path(ride_id): Path<RideId>,
    Json(req): Json<ChairRideStatusRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let mut tx = state.pool.begin().await?;

    let ride = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = ? FOR UPDATE")
        .bind(&ride_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GatewayError::NotFound("ride not found"))?;

    if ride.chair_id.as_ref() != Some(&chair.id) {
        return Err(GatewayError::Validation(
            "not assigned to this ride".to_owned(),
        ));
    }

    let next = match req.status.as_str() {
        // Acknowledge the assignment.
        "ENROUTE" => RideStatusKind::Enroute,
        // Declare the rider on board; only legal right after pickup.
        "CARRYING" => {
            let status = queries::latest_ride_status(&mut *tx, &ride.id)
                .await?
                .ok_or_else(|| GatewayError::Internal("ride has no status log".to_owned()))?;
            if status != RideStatusKind::Pickup {
                return Err(GatewayError::Validation(
                    "chair has not arrived yet".to_owned(),
                ));
            }
            RideStatusKind::Carrying
        }
        _ => return Err(GatewayError::Validation("invalid status".to_owned())),
    };

    queries::insert_ride_status(&mut *tx, &ride.id, next).await?;
    tx.commit().await?;

    state
        .cache
        .set_latest_ride_status(ride.id.clone(), next)
        .await;
    publish_ride_transition(&state, &ride, next).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Chair routes, mounted under `/api/chair`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chairs", post(post_chairs))
        .route("/activity", post(post_activity))
        .route("/coordinate", post(post_coordinate))
        .route("/notification", get(get_notification))
        .route("/rides/{ride_id}/status", post(post_ride_status))
}

//! Rider-surface handlers: registration, payment methods, ride
//! creation, fare quotes, evaluation, ride history, the notification
//! stream, and the nearby-chair search.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use chrono::Utc;

use super::publish_ride_transition;
use crate::api::auth::{self, SessionUser};
use crate::api::dto::{
    CreateRideRequest, CreateRideResponse, EstimatedFareRequest, EstimatedFareResponse,
    NearbyChair, NearbyChairsQuery, NearbyChairsResponse, RegisterPaymentMethodRequest,
    RegisterUserRequest, RegisterUserResponse, RideEvaluationRequest, RideEvaluationResponse,
    RideHistoryChair, RideHistoryItem, RideHistoryResponse,
};
use crate::api::sse;
use crate::app_state::AppState;
use crate::dispatcher::PendingRide;
use crate::domain::{self, Coordinate, RideId, RideStatusKind, UserId};
use crate::error::{ErrorMessage, GatewayError};
use crate::persistence::models::{Chair, Coupon, Owner, PaymentToken, Ride, User};
use crate::persistence::queries;

/// Discount granted by the first-ride campaign coupon.
const CAMPAIGN_DISCOUNT: i32 = 3000;

/// Discount granted to an invited rider.
const INVITATION_DISCOUNT: i32 = 1500;

/// Discount granted to the inviter as a reward.
const REWARD_DISCOUNT: i32 = 1000;

/// How many riders may redeem one invitation code.
const INVITATION_LIMIT: i64 = 3;

/// `POST /api/app/users` — Register a rider.
///
/// Grants the first-ride campaign coupon and, when an invitation code
/// is supplied, the invitation/reward coupon pair.
///
/// # Errors
///
/// Returns [`GatewayError`] on missing fields or an unusable
/// invitation code.
#[utoipa::path(
    post,
    path = "/api/app/users",
    tag = "App",
    summary = "Register a rider",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Rider registered", body = RegisterUserResponse),
        (status = 400, description = "Missing fields or unusable invitation code", body = ErrorMessage),
    )
)]
pub async fn post_users(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.username.is_empty()
        || req.firstname.is_empty()
        || req.lastname.is_empty()
        || req.date_of_birth.is_empty()
    {
        return Err(GatewayError::Validation(
            "required fields(username, firstname, lastname, date_of_birth) are empty".to_owned(),
        ));
    }

    let user_id = UserId::generate();
    let access_token = auth::mint_secret(32);
    let invitation_code = auth::mint_secret(15);

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, username, firstname, lastname, date_of_birth, access_token, invitation_code) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(&req.username)
    .bind(&req.firstname)
    .bind(&req.lastname)
    .bind(&req.date_of_birth)
    .bind(&access_token)
    .bind(&invitation_code)
    .execute(&mut *tx)
    .await?;

    // First-ride campaign coupon.
    sqlx::query("INSERT INTO coupons (user_id, code, discount) VALUES (?, 'CP_NEW2024', ?)")
        .bind(&user_id)
        .bind(CAMPAIGN_DISCOUNT)
        .execute(&mut *tx)
        .await?;

    if let Some(code) = req.invitation_code.as_deref().filter(|c| !c.is_empty()) {
        let invitation_coupon_code = format!("INV_{code}");

        // Cap redemptions per code; the lock serializes concurrent
        // registrations with the same code.
        let issued = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = ? FOR UPDATE")
            .bind(&invitation_coupon_code)
            .fetch_all(&mut *tx)
            .await?;
        if issued.len() as i64 >= INVITATION_LIMIT {
            return Err(GatewayError::Validation(
                "this invitation code cannot be used".to_owned(),
            ));
        }

        let inviter =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE invitation_code = ?")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    GatewayError::Validation("this invitation code cannot be used".to_owned())
                })?;

        sqlx::query("INSERT INTO coupons (user_id, code, discount) VALUES (?, ?, ?)")
            .bind(&user_id)
            .bind(&invitation_coupon_code)
            .bind(INVITATION_DISCOUNT)
            .execute(&mut *tx)
            .await?;

        let reward_code = format!("RWD_{code}_{}", Utc::now().timestamp_millis());
        sqlx::query("INSERT INTO coupons (user_id, code, discount) VALUES (?, ?, ?)")
            .bind(&inviter.id)
            .bind(&reward_code)
            .bind(REWARD_DISCOUNT)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let now = Utc::now();
    state
        .cache
        .upsert_user(User {
            id: user_id.clone(),
            username: req.username,
            firstname: req.firstname,
            lastname: req.lastname,
            date_of_birth: req.date_of_birth,
            access_token: access_token.clone(),
            invitation_code: invitation_code.clone(),
            created_at: now,
            updated_at: now,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        [(
            header::SET_COOKIE,
            auth::session_cookie("app_session", &access_token),
        )],
        Json(RegisterUserResponse {
            id: user_id,
            invitation_code,
        }),
    ))
}

/// `POST /api/app/payment-methods` — Register the rider's payment token.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when the token is empty.
#[utoipa::path(
    post,
    path = "/api/app/payment-methods",
    tag = "App",
    summary = "Register a payment token",
    request_body = RegisterPaymentMethodRequest,
    responses(
        (status = 204, description = "Token stored"),
        (status = 400, description = "Empty token", body = ErrorMessage),
    )
)]
pub async fn post_payment_methods(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Json(req): Json<RegisterPaymentMethodRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.token.is_empty() {
        return Err(GatewayError::Validation(
            "token is required but was empty".to_owned(),
        ));
    }

    sqlx::query("INSERT INTO payment_tokens (user_id, token) VALUES (?, ?)")
        .bind(&user.id)
        .bind(&req.token)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/app/rides` — The rider's completed rides.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
#[utoipa::path(
    get,
    path = "/api/app/rides",
    tag = "App",
    summary = "List completed rides",
    responses(
        (status = 200, description = "Completed rides, newest first", body = RideHistoryResponse),
    )
)]
pub async fn get_rides(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<impl IntoResponse, GatewayError> {
    let mut tx = state.pool.begin().await?;

    let rides = sqlx::query_as::<_, Ride>(
        "SELECT * FROM rides WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&mut *tx)
    .await?;

    let mut items = Vec::new();
    for ride in rides {
        let status = match state.cache.latest_ride_status(&ride.id).await {
            Some(status) => status,
            None => queries::latest_ride_status(&mut *tx, &ride.id)
                .await?
                .ok_or_else(|| GatewayError::Internal("ride has no status log".to_owned()))?,
        };
        if status != RideStatusKind::Completed {
            continue;
        }

        let fare = queries::discounted_fare(
            &mut *tx,
            &user.id,
            Some(&ride),
            ride.pickup_coordinate(),
            ride.destination_coordinate(),
        )
        .await?;

        let Some(chair_id) = &ride.chair_id else {
            continue;
        };
        let Some(chair) = state.cache.chair(chair_id).await else {
            continue;
        };
        let owner = match state.cache.owner(&chair.owner_id).await {
            Some(owner) => owner,
            None => {
                sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE id = ?")
                    .bind(&chair.owner_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        items.push(RideHistoryItem {
            id: ride.id.clone(),
            pickup_coordinate: ride.pickup_coordinate(),
            destination_coordinate: ride.destination_coordinate(),
            chair: RideHistoryChair {
                id: chair.id,
                owner: owner.name,
                name: chair.name,
                model: chair.model,
            },
            fare,
            evaluation: ride.evaluation.unwrap_or_default(),
            requested_at: ride.created_at.timestamp_millis(),
            completed_at: ride.updated_at.timestamp_millis(),
        });
    }

    tx.commit().await?;

    Ok(Json(RideHistoryResponse { rides: items }))
}

/// Binds the best coupon to a fresh ride, if the rider has one.
///
/// Priority: the first-ride campaign coupon when this is the rider's
/// first ride, then the oldest unused coupon. Selection runs under
/// `FOR UPDATE` so a coupon can never be spent twice.
async fn bind_best_coupon(
    tx: &mut sqlx::MySqlConnection,
    user_id: &UserId,
    ride_id: &RideId,
    first_ride: bool,
) -> Result<(), GatewayError> {
    if first_ride {
        let campaign = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE user_id = ? AND code = 'CP_NEW2024' \
             AND used_by IS NULL FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if campaign.is_some() {
            sqlx::query(
                "UPDATE coupons SET used_by = ? WHERE user_id = ? AND code = 'CP_NEW2024'",
            )
            .bind(ride_id)
            .bind(user_id)
            .execute(tx)
            .await?;
            return Ok(());
        }
    }

    let oldest = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons WHERE user_id = ? AND used_by IS NULL \
         ORDER BY created_at LIMIT 1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(coupon) = oldest {
        sqlx::query("UPDATE coupons SET used_by = ? WHERE user_id = ? AND code = ?")
            .bind(ride_id)
            .bind(user_id)
            .bind(&coupon.code)
            .execute(tx)
            .await?;
    }
    Ok(())
}

/// `POST /api/app/rides` — Create a ride request.
///
/// At most one unfinished ride per rider; the best coupon is bound
/// atomically and the quoted fare reflects it.
///
/// # Errors
///
/// Returns [`GatewayError::Conflict`] while an unfinished ride exists,
/// [`GatewayError::Validation`] on missing coordinates.
#[utoipa::path(
    post,
    path = "/api/app/rides",
    tag = "App",
    summary = "Request a ride",
    request_body = CreateRideRequest,
    responses(
        (status = 202, description = "Ride accepted for matching", body = CreateRideResponse),
        (status = 400, description = "Missing coordinates", body = ErrorMessage),
        (status = 409, description = "An unfinished ride exists", body = ErrorMessage),
    )
)]
pub async fn post_rides(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Json(req): Json<CreateRideRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (Some(pickup), Some(destination)) = (req.pickup_coordinate, req.destination_coordinate)
    else {
        return Err(GatewayError::Validation(
            "required fields(pickup_coordinate, destination_coordinate) are empty".to_owned(),
        ));
    };

    let ride_id = RideId::generate();
    let mut tx = state.pool.begin().await?;

    // Serialize ride creation per rider so the one-unfinished-ride
    // check cannot race itself.
    sqlx::query("SELECT id FROM users WHERE id = ? FOR UPDATE")
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

    let unfinished: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM rides WHERE user_id = ? AND evaluation IS NULL",
    )
    .bind(&user.id)
    .fetch_one(&mut *tx)
    .await?;
    if unfinished > 0 {
        return Err(GatewayError::Conflict("ride already exists"));
    }

    let prior_rides: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM rides WHERE user_id = ?")
        .bind(&user.id)
        .fetch_one(&mut *tx)
        .await?;

    let now = Utc::now();
    let ride = Ride {
        id: ride_id.clone(),
        user_id: user.id.clone(),
        chair_id: None,
        pickup_latitude: pickup.latitude,
        pickup_longitude: pickup.longitude,
        destination_latitude: destination.latitude,
        destination_longitude: destination.longitude,
        evaluation: None,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO rides (id, user_id, pickup_latitude, pickup_longitude, \
         destination_latitude, destination_longitude, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ride.id)
    .bind(&ride.user_id)
    .bind(ride.pickup_latitude)
    .bind(ride.pickup_longitude)
    .bind(ride.destination_latitude)
    .bind(ride.destination_longitude)
    .bind(ride.created_at)
    .bind(ride.updated_at)
    .execute(&mut *tx)
    .await?;

    queries::insert_ride_status(&mut *tx, &ride.id, RideStatusKind::Matching).await?;

    bind_best_coupon(&mut *tx, &user.id, &ride.id, prior_rides == 0).await?;

    let fare = queries::discounted_fare(&mut *tx, &user.id, Some(&ride), pickup, destination).await?;

    tx.commit().await?;

    state
        .cache
        .set_latest_ride_status(ride.id.clone(), RideStatusKind::Matching)
        .await;
    state.dispatcher.ride_created(PendingRide::from(&ride)).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateRideResponse { ride_id, fare }),
    ))
}

/// `POST /api/app/rides/estimated-fare` — Quote a hypothetical ride.
///
/// Applies the coupon priority rule read-only; nothing is consumed.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] on missing coordinates.
#[utoipa::path(
    post,
    path = "/api/app/rides/estimated-fare",
    tag = "App",
    summary = "Estimate a fare",
    request_body = EstimatedFareRequest,
    responses(
        (status = 200, description = "Quoted fare and discount", body = EstimatedFareResponse),
        (status = 400, description = "Missing coordinates", body = ErrorMessage),
    )
)]
pub async fn post_rides_estimated_fare(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Json(req): Json<EstimatedFareRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (Some(pickup), Some(destination)) = (req.pickup_coordinate, req.destination_coordinate)
    else {
        return Err(GatewayError::Validation(
            "required fields(pickup_coordinate, destination_coordinate) are empty".to_owned(),
        ));
    };

    let mut conn = state.pool.acquire().await?;
    let discounted =
        queries::discounted_fare(&mut *conn, &user.id, None, pickup, destination).await?;

    Ok(Json(EstimatedFareResponse {
        fare: discounted,
        discount: domain::fare::calculate_fare(pickup, destination) - discounted,
    }))
}

/// `POST /api/app/rides/{ride_id}/evaluation` — Complete a ride.
///
/// Allowed only in state ARRIVED. Books the payment through the
/// gateway before committing; the COMPLETED status only exists once
/// the gateway acknowledged.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for a bad rating, a premature
/// evaluation, or a missing payment token;
/// [`GatewayError::NotFound`] for an unknown ride;
/// [`GatewayError::PaymentUpstream`] when the gateway never accepts.
#[utoipa::path(
    post,
    path = "/api/app/rides/{ride_id}/evaluation",
    tag = "App",
    summary = "Evaluate a completed trip",
    request_body = RideEvaluationRequest,
    params(("ride_id" = String, Path, description = "Ride to evaluate")),
    responses(
        (status = 200, description = "Ride completed", body = RideEvaluationResponse),
        (status = 400, description = "Bad rating, not arrived, or no payment token", body = ErrorMessage),
        (status = 404, description = "Ride not found", body = ErrorMessage),
        (status = 502, description = "Payment gateway failure", body = ErrorMessage),
    )
)]
pub async fn post_ride_evaluation(
    State(state): State<AppState>,
    SessionUser(_user): SessionUser,
    Path(ride_id): Path<RideId>,
    Json(req): Json<RideEvaluationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if !(1..=5).contains(&req.evaluation) {
        return Err(GatewayError::Validation(
            "evaluation must be between 1 and 5".to_owned(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let mut ride = queries::ride_by_id(&mut *tx, &ride_id)
        .await?
        .ok_or(GatewayError::NotFound("ride not found"))?;
    let status = queries::latest_ride_status(&mut *tx, &ride.id)
        .await?
        .ok_or_else(|| GatewayError::Internal("ride has no status log".to_owned()))?;
    if status != RideStatusKind::Arrived {
        return Err(GatewayError::Validation("not arrived yet".to_owned()));
    }

    let now = Utc::now();
    let updated = sqlx::query("UPDATE rides SET evaluation = ?, updated_at = ? WHERE id = ?")
        .bind(req.evaluation)
        .bind(now)
        .bind(&ride.id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(GatewayError::NotFound("ride not found"));
    }
    ride.evaluation = Some(req.evaluation);
    ride.updated_at = now;

    queries::insert_ride_status(&mut *tx, &ride.id, RideStatusKind::Completed).await?;

    let payment_token =
        sqlx::query_as::<_, PaymentToken>("SELECT * FROM payment_tokens WHERE user_id = ?")
            .bind(&ride.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                GatewayError::Validation("payment token not registered".to_owned())
            })?;

    let fare = queries::discounted_fare(
        &mut *tx,
        &ride.user_id,
        Some(&ride),
        ride.pickup_coordinate(),
        ride.destination_coordinate(),
    )
    .await?;
    let gateway_url = queries::payment_gateway_url(&mut *tx).await?;

    state
        .payment
        .post_payment(&gateway_url, &payment_token.token, &ride.id, fare)
        .await?;

    tx.commit().await?;

    state
        .cache
        .set_latest_ride_status(ride.id.clone(), RideStatusKind::Completed)
        .await;
    publish_ride_transition(&state, &ride, RideStatusKind::Completed).await;
    if let Some(chair_id) = ride.chair_id.clone() {
        state.dispatcher.chair_available(chair_id).await;
    }

    Ok(Json(RideEvaluationResponse {
        completed_at: now.timestamp_millis(),
    }))
}

/// `GET /api/app/notification` — The rider's SSE stream.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] if the connect-time replay fails.
pub async fn get_notification(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<Response, GatewayError> {
    sse::rider_notification_stream(state, user).await
}

/// `GET /api/app/nearby-chairs` — Available chairs around a point.
///
/// A chair qualifies when it is active, has no unevaluated ride, has a
/// known location, and is within the Manhattan radius.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] on missing coordinates.
#[utoipa::path(
    get,
    path = "/api/app/nearby-chairs",
    tag = "App",
    summary = "Find nearby available chairs",
    params(NearbyChairsQuery),
    responses(
        (status = 200, description = "Chairs within the radius", body = NearbyChairsResponse),
        (status = 400, description = "Missing coordinates", body = ErrorMessage),
    )
)]
pub async fn get_nearby_chairs(
    State(state): State<AppState>,
    SessionUser(_user): SessionUser,
    Query(query): Query<NearbyChairsQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let (Some(latitude), Some(longitude)) = (query.latitude, query.longitude) else {
        return Err(GatewayError::Validation(
            "latitude or longitude is empty".to_owned(),
        ));
    };
    let distance = query.distance.unwrap_or(50);
    let center = Coordinate::new(latitude, longitude);

    let chairs = sqlx::query_as::<_, Chair>(
        "SELECT c.* FROM chairs AS c \
         LEFT JOIN rides AS r ON r.chair_id = c.id AND r.evaluation IS NULL \
         WHERE r.id IS NULL AND c.is_active = TRUE",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut nearby = Vec::new();
    for chair in chairs {
        let Some(location) = state.cache.chair_location(&chair.id).await else {
            continue;
        };
        if center.distance_to(location.coordinate) <= distance {
            nearby.push(NearbyChair {
                id: chair.id,
                name: chair.name,
                model: chair.model,
                current_coordinate: location.coordinate,
            });
        }
    }

    Ok(Json(NearbyChairsResponse {
        chairs: nearby,
        retrieved_at: Utc::now().timestamp_millis(),
    }))
}

/// Rider routes, mounted under `/api/app`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(post_users))
        .route("/payment-methods", post(post_payment_methods))
        .route("/rides", get(get_rides).post(post_rides))
        .route("/rides/estimated-fare", post(post_rides_estimated_fare))
        .route("/rides/{ride_id}/evaluation", post(post_ride_evaluation))
        .route("/notification", get(get_notification))
        .route("/nearby-chairs", get(get_nearby_chairs))
}

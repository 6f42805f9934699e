//! Owner-surface handlers: registration, sales aggregation, and the
//! fleet's chair overview.

use std::collections::HashMap;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use chrono::{DateTime, TimeZone, Utc};

use crate::api::auth::{self, SessionOwner};
use crate::api::dto::{
    ChairSales, ModelSales, OwnerChair, OwnerChairsResponse, RegisterOwnerRequest,
    RegisterOwnerResponse, SalesQuery, SalesResponse,
};
use crate::app_state::AppState;
use crate::domain::{self, OwnerId};
use crate::error::{ErrorMessage, GatewayError};
use crate::persistence::models::{Chair, ChairModel, Owner, Ride};

/// `POST /api/owner/owners` — Register a fleet owner.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when the name is empty.
#[utoipa::path(
    post,
    path = "/api/owner/owners",
    tag = "Owner",
    summary = "Register an owner",
    request_body = RegisterOwnerRequest,
    responses(
        (status = 201, description = "Owner registered", body = RegisterOwnerResponse),
        (status = 400, description = "Empty name", body = ErrorMessage),
    )
)]
pub async fn post_owners(
    State(state): State<AppState>,
    Json(req): Json<RegisterOwnerRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.name.is_empty() {
        return Err(GatewayError::Validation(
            "some of required fields(name) are empty".to_owned(),
        ));
    }

    let owner_id = OwnerId::generate();
    let access_token = auth::mint_secret(32);
    let chair_register_token = auth::mint_secret(32);

    sqlx::query(
        "INSERT INTO owners (id, name, access_token, chair_register_token) VALUES (?, ?, ?, ?)",
    )
    .bind(&owner_id)
    .bind(&req.name)
    .bind(&access_token)
    .bind(&chair_register_token)
    .execute(&state.pool)
    .await?;

    let now = Utc::now();
    state
        .cache
        .upsert_owner(Owner {
            id: owner_id.clone(),
            name: req.name,
            access_token: access_token.clone(),
            chair_register_token: chair_register_token.clone(),
            created_at: now,
            updated_at: now,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        [(
            header::SET_COOKIE,
            auth::session_cookie("owner_session", &access_token),
        )],
        Json(RegisterOwnerResponse {
            id: owner_id,
            chair_register_token,
        }),
    ))
}

/// `GET /api/owner/sales` — Sales totals over a time window.
///
/// The window is inclusive in milliseconds; evaluated rides whose
/// `updated_at` falls inside count with their undiscounted fare.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] for unparsable bounds.
#[utoipa::path(
    get,
    path = "/api/owner/sales",
    tag = "Owner",
    summary = "Sales report",
    params(SalesQuery),
    responses(
        (status = 200, description = "Totals per chair and per model", body = SalesResponse),
        (status = 400, description = "Bad time bounds", body = ErrorMessage),
    )
)]
pub async fn get_sales(
    State(state): State<AppState>,
    SessionOwner(owner): SessionOwner,
    Query(query): Query<SalesQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let since = match query.since {
        Some(millis) => DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| GatewayError::Validation("since is invalid".to_owned()))?,
        None => DateTime::<Utc>::from_timestamp_millis(0)
            .unwrap_or_else(Utc::now),
    };
    let until = match query.until {
        Some(millis) => DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| GatewayError::Validation("until is invalid".to_owned()))?,
        None => Utc
            .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or_else(Utc::now),
    };
    // The upper bound is inclusive to millisecond precision.
    let until = until + chrono::Duration::microseconds(999);

    let mut tx = state.pool.begin().await?;

    let chairs = sqlx::query_as::<_, Chair>("SELECT * FROM chairs WHERE owner_id = ?")
        .bind(&owner.id)
        .fetch_all(&mut *tx)
        .await?;
    let chair_by_id: HashMap<_, _> = chairs.iter().map(|c| (c.id.clone(), c)).collect();

    let rides = sqlx::query_as::<_, Ride>(
        "SELECT rides.* FROM rides \
         INNER JOIN chairs ON rides.chair_id = chairs.id \
         WHERE chairs.owner_id = ? AND rides.evaluation IS NOT NULL \
         AND rides.updated_at BETWEEN ? AND ?",
    )
    .bind(&owner.id)
    .bind(since)
    .bind(until)
    .fetch_all(&mut *tx)
    .await?;

    let models = sqlx::query_as::<_, ChairModel>("SELECT * FROM chair_models")
        .fetch_all(&mut *tx)
        .await?;

    tx.commit().await?;

    let mut total_sales = 0i64;
    let mut sales_by_model: HashMap<String, i64> =
        models.into_iter().map(|m| (m.name, 0)).collect();
    let mut sales_by_chair: HashMap<_, i64> = HashMap::new();
    for ride in &rides {
        let sale = i64::from(domain::fare::calculate_fare(
            ride.pickup_coordinate(),
            ride.destination_coordinate(),
        ));
        total_sales += sale;
        if let Some(chair_id) = &ride.chair_id {
            *sales_by_chair.entry(chair_id.clone()).or_insert(0) += sale;
            if let Some(chair) = chair_by_id.get(chair_id) {
                *sales_by_model.entry(chair.model.clone()).or_insert(0) += sale;
            }
        }
    }

    let chairs = chairs
        .iter()
        .map(|chair| ChairSales {
            id: chair.id.clone(),
            name: chair.name.clone(),
            sales: sales_by_chair.get(&chair.id).copied().unwrap_or(0),
        })
        .collect();
    let models = sales_by_model
        .into_iter()
        .map(|(model, sales)| ModelSales { model, sales })
        .collect();

    Ok(Json(SalesResponse {
        total_sales,
        chairs,
        models,
    }))
}

/// `GET /api/owner/chairs` — The fleet's chairs with usage numbers.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
#[utoipa::path(
    get,
    path = "/api/owner/chairs",
    tag = "Owner",
    summary = "List the fleet's chairs",
    responses(
        (status = 200, description = "Chairs with distance totals", body = OwnerChairsResponse),
    )
)]
pub async fn get_chairs(
    State(state): State<AppState>,
    SessionOwner(owner): SessionOwner,
) -> Result<impl IntoResponse, GatewayError> {
    let chairs = sqlx::query_as::<_, Chair>("SELECT * FROM chairs WHERE owner_id = ?")
        .bind(&owner.id)
        .fetch_all(&state.pool)
        .await?;

    let mut items = Vec::with_capacity(chairs.len());
    for chair in chairs {
        let total_distance = state
            .cache
            .chair_total_distance(&chair.id)
            .await
            .unwrap_or(0);
        let mut total_distance_updated_at = None;
        if total_distance > 0 {
            total_distance_updated_at = state
                .cache
                .chair_location(&chair.id)
                .await
                .map(|l| l.recorded_at.timestamp_millis());
        }
        items.push(OwnerChair {
            id: chair.id,
            name: chair.name,
            model: chair.model,
            active: chair.is_active,
            registered_at: chair.created_at.timestamp_millis(),
            total_distance,
            total_distance_updated_at,
        });
    }

    Ok(Json(OwnerChairsResponse { chairs: items }))
}

/// Owner routes, mounted under `/api/owner`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/owners", post(post_owners))
        .route("/sales", get(get_sales))
        .route("/chairs", get(get_chairs))
}

//! DTOs for the rider surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ChairId, Coordinate, RideId, UserId};

/// `POST /api/app/users` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub date_of_birth: String,
    /// Invitation code of an existing user, if the rider was invited.
    pub invitation_code: Option<String>,
}

/// `POST /api/app/users` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterUserResponse {
    pub id: UserId,
    /// The new rider's own invitation code.
    pub invitation_code: String,
}

/// `POST /api/app/payment-methods` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPaymentMethodRequest {
    pub token: String,
}

/// `GET /api/app/rides` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RideHistoryResponse {
    pub rides: Vec<RideHistoryItem>,
}

/// One completed ride in the rider's history.
#[derive(Debug, Serialize, ToSchema)]
pub struct RideHistoryItem {
    pub id: RideId,
    pub pickup_coordinate: Coordinate,
    pub destination_coordinate: Coordinate,
    pub chair: RideHistoryChair,
    pub fare: i32,
    pub evaluation: i32,
    /// Ride creation time, milliseconds since epoch.
    pub requested_at: i64,
    /// Ride completion time, milliseconds since epoch.
    pub completed_at: i64,
}

/// Chair summary in the ride history.
#[derive(Debug, Serialize, ToSchema)]
pub struct RideHistoryChair {
    pub id: ChairId,
    /// Name of the fleet owner operating the chair.
    pub owner: String,
    pub name: String,
    pub model: String,
}

/// `POST /api/app/rides` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRideRequest {
    pub pickup_coordinate: Option<Coordinate>,
    pub destination_coordinate: Option<Coordinate>,
}

/// `POST /api/app/rides` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRideResponse {
    pub ride_id: RideId,
    /// Quoted discounted fare.
    pub fare: i32,
}

/// `POST /api/app/rides/estimated-fare` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EstimatedFareRequest {
    pub pickup_coordinate: Option<Coordinate>,
    pub destination_coordinate: Option<Coordinate>,
}

/// `POST /api/app/rides/estimated-fare` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct EstimatedFareResponse {
    /// Discounted fare the rider would pay.
    pub fare: i32,
    /// Discount the best applicable coupon would grant.
    pub discount: i32,
}

/// `POST /api/app/rides/{ride_id}/evaluation` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RideEvaluationRequest {
    /// Rating from 1 to 5.
    pub evaluation: i32,
}

/// `POST /api/app/rides/{ride_id}/evaluation` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RideEvaluationResponse {
    /// Completion time, milliseconds since epoch.
    pub completed_at: i64,
}

/// `GET /api/app/nearby-chairs` query parameters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyChairsQuery {
    pub latitude: Option<i32>,
    pub longitude: Option<i32>,
    /// Search radius (Manhattan), default 50.
    pub distance: Option<i32>,
}

/// `GET /api/app/nearby-chairs` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyChairsResponse {
    pub chairs: Vec<NearbyChair>,
    /// Snapshot time, milliseconds since epoch.
    pub retrieved_at: i64,
}

/// A chair available near the queried point.
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyChair {
    pub id: ChairId,
    pub name: String,
    pub model: String,
    pub current_coordinate: Coordinate,
}

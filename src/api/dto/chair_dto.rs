//! DTOs for the chair surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ChairId, OwnerId};

/// `POST /api/chair/chairs` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterChairRequest {
    pub name: String,
    pub model: String,
    /// The owner's chair-register token.
    pub chair_register_token: String,
}

/// `POST /api/chair/chairs` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterChairResponse {
    pub id: ChairId,
    pub owner_id: OwnerId,
}

/// `POST /api/chair/activity` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChairActivityRequest {
    pub is_active: bool,
}

/// `POST /api/chair/coordinate` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChairCoordinateResponse {
    /// When the report was recorded, milliseconds since epoch.
    pub recorded_at: i64,
}

/// `POST /api/chair/rides/{ride_id}/status` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChairRideStatusRequest {
    /// Requested transition; only `ENROUTE` and `CARRYING` are legal
    /// here.
    pub status: String,
}

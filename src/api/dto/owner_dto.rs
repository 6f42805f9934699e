//! DTOs for the owner surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ChairId, OwnerId};

/// `POST /api/owner/owners` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterOwnerRequest {
    pub name: String,
}

/// `POST /api/owner/owners` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterOwnerResponse {
    pub id: OwnerId,
    /// Token chairs present when registering into this fleet.
    pub chair_register_token: String,
}

/// `GET /api/owner/sales` query parameters, milliseconds since epoch.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SalesQuery {
    pub since: Option<i64>,
    pub until: Option<i64>,
}

/// `GET /api/owner/sales` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct SalesResponse {
    pub total_sales: i64,
    pub chairs: Vec<ChairSales>,
    pub models: Vec<ModelSales>,
}

/// Sales aggregated per chair.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChairSales {
    pub id: ChairId,
    pub name: String,
    pub sales: i64,
}

/// Sales aggregated per chair model.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModelSales {
    pub model: String,
    pub sales: i64,
}

/// `GET /api/owner/chairs` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnerChairsResponse {
    pub chairs: Vec<OwnerChair>,
}

/// One chair of the owner's fleet with its usage numbers.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnerChair {
    pub id: ChairId,
    pub name: String,
    pub model: String,
    pub active: bool,
    /// Registration time, milliseconds since epoch.
    pub registered_at: i64,
    /// Cumulative Manhattan distance traveled.
    pub total_distance: i64,
    /// When the distance last changed, milliseconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_distance_updated_at: Option<i64>,
}

//! DTOs for the initialization and internal endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `POST /api/initialize` request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializeRequest {
    /// Base URL of the payment gateway to use from now on.
    pub payment_server: String,
}

/// `POST /api/initialize` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct InitializeResponse {
    /// Implementation language reported to the harness.
    pub language: &'static str,
}

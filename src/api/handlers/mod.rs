//! REST endpoint handlers organized by client surface.

pub mod app;
pub mod chair;
pub mod owner;
pub mod system;

use crate::app_state::AppState;
use crate::domain::RideStatusKind;
use crate::persistence::models::Ride;

/// Fans a committed ride transition out to both notification queues.
///
/// Runs after the handler's transaction committed; failures here are
/// logged and never surfaced, the caller's operation already succeeded.
pub(crate) async fn publish_ride_transition(
    state: &AppState,
    ride: &Ride,
    status: RideStatusKind,
) {
    let result = async {
        let mut conn = state.pool.acquire().await?;
        state
            .hub
            .publish_ride_transition(&mut *conn, &state.cache, ride, status)
            .await
    }
    .await;
    if let Err(err) = result {
        tracing::error!(error = %err, ride_id = %ride.id, "failed to publish ride transition");
    }
}

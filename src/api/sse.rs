//! SSE delivery for the rider and chair notification endpoints.
//!
//! Each connection registers a queue with the notification hub, replays
//! the oldest undelivered status (or the latest one) from the store,
//! then forwards queued events. Delivery is kept in canonical
//! state-machine order: an event arriving ahead of its predecessor is
//! re-enqueued and retried. At-most-once per (ride, status) is enforced
//! through the store by claiming the status row's `*_sent_at` column
//! before a frame is written; an event whose row is already claimed is
//! swallowed.
//!
//! Rider frames are `data: <json>\n`, chair frames `data: <json>\n\n`.
//! A client disconnect drops the body stream, which ends the delivery
//! task on its next send.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use serde::Serialize;
use sqlx::MySqlPool;
use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::domain::{RideId, RideStatusKind};
use crate::error::GatewayError;
use crate::notifier;
use crate::persistence::models::{Chair, Ride, User};
use crate::persistence::queries;

/// Pause before retrying an event that arrived out of order.
const REORDER_BACKOFF: Duration = Duration::from_millis(25);

/// Frame suffix on the rider stream.
const RIDER_FRAME_SUFFIX: &str = "\n";

/// Frame suffix on the chair stream.
const CHAIR_FRAME_SUFFIX: &str = "\n\n";

/// Opens the rider notification stream.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] if the connect-time replay lookup
/// fails; later failures only end the stream.
pub async fn rider_notification_stream(
    state: AppState,
    user: User,
) -> Result<Response, GatewayError> {
    let (queue_tx, queue_rx) = state.hub.register_rider(user.id.clone()).await;

    let mut conn = state.pool.acquire().await?;
    let ride = sqlx::query_as::<_, Ride>(
        "SELECT * FROM rides WHERE user_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&user.id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut replay = None;
    if let Some(ride) = &ride {
        let status = replay_status(&mut *conn, &ride.id, "app_sent_at").await?;
        replay = Some(notifier::build_ride_notification(&mut *conn, &state.cache, ride, status).await?);
    }
    drop(conn);

    let (frame_tx, frame_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut last: Option<RideStatusKind> = None;

        if let Some(event) = replay {
            // Claim the row if still unclaimed; the frame goes out either
            // way, a reconnecting client needs its current state.
            if let Err(err) = claim_app_sent(&state.pool, &event.ride_id, event.status).await {
                tracing::error!(error = %err, "rider replay acknowledgment failed");
                return;
            }
            if !write_frame(&frame_tx, &event, RIDER_FRAME_SUFFIX).await {
                return;
            }
            last = Some(event.status);
        }

        let mut queue_rx = queue_rx;
        while let Some(event) = queue_rx.recv().await {
            if !delivery_allows(last, event.status) {
                if queue_tx.try_send(event).is_err() {
                    tracing::debug!("rider queue full, out-of-order event dropped");
                }
                tokio::time::sleep(REORDER_BACKOFF).await;
                continue;
            }
            let claimed = match claim_app_sent(&state.pool, &event.ride_id, event.status).await {
                Ok(claimed) => claimed,
                Err(err) => {
                    tracing::error!(error = %err, "rider acknowledgment failed");
                    return;
                }
            };
            if !claimed {
                // Someone already delivered this (ride, status).
                last = Some(event.status);
                continue;
            }
            if !write_frame(&frame_tx, &event, RIDER_FRAME_SUFFIX).await {
                return;
            }
            last = Some(event.status);
        }
    });

    Ok(sse_response(frame_rx))
}

/// Opens the chair notification stream.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] if the connect-time replay lookup
/// fails; later failures only end the stream.
pub async fn chair_notification_stream(
    state: AppState,
    chair: Chair,
) -> Result<Response, GatewayError> {
    let (queue_tx, queue_rx) = state.hub.register_chair(chair.id.clone()).await;

    let mut conn = state.pool.acquire().await?;
    let ride = sqlx::query_as::<_, Ride>(
        "SELECT * FROM rides WHERE chair_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&chair.id)
    .fetch_optional(&mut *conn)
    .await?;

    let mut replay = None;
    if let Some(ride) = &ride {
        let status = replay_status(&mut *conn, &ride.id, "chair_sent_at").await?;
        replay = notifier::build_chair_notification(&mut *conn, &state.cache, ride, status).await?;
    }
    drop(conn);

    let (frame_tx, frame_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut last: Option<RideStatusKind> = None;

        if let Some(event) = replay {
            if let Err(err) = claim_chair_sent(&state.pool, &event.ride_id, event.status).await {
                tracing::error!(error = %err, "chair replay acknowledgment failed");
                return;
            }
            if !write_frame(&frame_tx, &event, CHAIR_FRAME_SUFFIX).await {
                return;
            }
            last = Some(event.status);
        }

        let mut queue_rx = queue_rx;
        while let Some(event) = queue_rx.recv().await {
            if !delivery_allows(last, event.status) {
                if queue_tx.try_send(event).is_err() {
                    tracing::debug!("chair queue full, out-of-order event dropped");
                }
                tokio::time::sleep(REORDER_BACKOFF).await;
                continue;
            }
            let claimed = match claim_chair_sent(&state.pool, &event.ride_id, event.status).await {
                Ok(claimed) => claimed,
                Err(err) => {
                    tracing::error!(error = %err, "chair acknowledgment failed");
                    return;
                }
            };
            if !claimed {
                last = Some(event.status);
                continue;
            }
            if !write_frame(&frame_tx, &event, CHAIR_FRAME_SUFFIX).await {
                return;
            }
            last = Some(event.status);
        }
    });

    Ok(sse_response(frame_rx))
}

/// The status to replay on connect: the oldest undelivered one, or the
/// latest when everything was delivered.
async fn replay_status(
    conn: &mut sqlx::MySqlConnection,
    ride_id: &RideId,
    sent_column: &str,
) -> Result<RideStatusKind, GatewayError> {
    let unsent = sqlx::query_scalar::<_, RideStatusKind>(&format!(
        "SELECT status FROM ride_statuses WHERE ride_id = ? AND {sent_column} IS NULL \
         ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(ride_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(status) = unsent {
        return Ok(status);
    }
    queries::latest_ride_status(conn, ride_id)
        .await?
        .ok_or_else(|| GatewayError::Internal("ride has no status log".to_owned()))
}

/// Whether `next` may be delivered after `last` on one stream.
///
/// Allowed: the very first event, a repeat of the last status (resolved
/// by the acknowledgment claim), the legal successor, and the MATCHING
/// of a new ride after a terminal status.
fn delivery_allows(last: Option<RideStatusKind>, next: RideStatusKind) -> bool {
    match last {
        None => true,
        Some(prev) => {
            next == prev
                || prev.successor() == Some(next)
                || (prev.is_terminal() && next == RideStatusKind::Matching)
        }
    }
}

/// Claims the rider-side acknowledgment for one (ride, status) row.
///
/// Returns `false` when the row was already claimed.
async fn claim_app_sent(
    pool: &MySqlPool,
    ride_id: &RideId,
    status: RideStatusKind,
) -> Result<bool, GatewayError> {
    let result = sqlx::query(
        "UPDATE ride_statuses SET app_sent_at = CURRENT_TIMESTAMP(6) \
         WHERE ride_id = ? AND status = ? AND app_sent_at IS NULL",
    )
    .bind(ride_id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Claims the chair-side acknowledgment for one (ride, status) row.
async fn claim_chair_sent(
    pool: &MySqlPool,
    ride_id: &RideId,
    status: RideStatusKind,
) -> Result<bool, GatewayError> {
    let result = sqlx::query(
        "UPDATE ride_statuses SET chair_sent_at = CURRENT_TIMESTAMP(6) \
         WHERE ride_id = ? AND status = ? AND chair_sent_at IS NULL",
    )
    .bind(ride_id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Serializes one event and pushes the framed bytes to the body stream.
///
/// Returns `false` once the client is gone.
async fn write_frame<T: Serialize>(
    frame_tx: &mpsc::Sender<Result<Bytes, Infallible>>,
    event: &T,
    suffix: &str,
) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "notification serialization failed");
            return false;
        }
    };
    let frame = Bytes::from(format!("data: {json}{suffix}"));
    frame_tx.send(Ok(frame)).await.is_ok()
}

/// Wraps a frame channel into a streaming `text/event-stream` response.
fn sse_response(frames: mpsc::Receiver<Result<Bytes, Infallible>>) -> Response {
    let stream = stream::unfold(frames, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn first_event_is_always_deliverable() {
        assert!(delivery_allows(None, RideStatusKind::Arrived));
    }

    #[test]
    fn successor_is_deliverable() {
        assert!(delivery_allows(
            Some(RideStatusKind::Enroute),
            RideStatusKind::Pickup
        ));
    }

    #[test]
    fn skipping_ahead_is_blocked() {
        assert!(!delivery_allows(
            Some(RideStatusKind::Enroute),
            RideStatusKind::Carrying
        ));
        assert!(!delivery_allows(
            Some(RideStatusKind::Matching),
            RideStatusKind::Pickup
        ));
    }

    #[test]
    fn repeat_of_last_status_passes_to_the_claim() {
        assert!(delivery_allows(
            Some(RideStatusKind::Matching),
            RideStatusKind::Matching
        ));
    }

    #[test]
    fn new_ride_starts_after_terminal_status() {
        assert!(delivery_allows(
            Some(RideStatusKind::Completed),
            RideStatusKind::Matching
        ));
        assert!(!delivery_allows(
            Some(RideStatusKind::Completed),
            RideStatusKind::Enroute
        ));
    }
}

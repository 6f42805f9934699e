//! Shared SQL helpers used across handlers, the dispatcher, and the
//! notification streams.
//!
//! Everything takes `&mut MySqlConnection` so the same helper runs
//! inside a handler transaction or on a plain pool connection.

use sqlx::MySqlConnection;

use super::models::{Coupon, Ride};
use crate::domain::{self, Coordinate, NotificationChairStats, RideId, RideStatusKind, UserId};
use crate::error::GatewayError;

/// Returns the latest status of a ride, or `None` for an unknown ride.
///
/// "Latest" is the greatest `created_at` in the append-only status log.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn latest_ride_status(
    conn: &mut MySqlConnection,
    ride_id: &RideId,
) -> Result<Option<RideStatusKind>, GatewayError> {
    let status = sqlx::query_scalar::<_, RideStatusKind>(
        "SELECT status FROM ride_statuses WHERE ride_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(ride_id)
    .fetch_optional(conn)
    .await?;
    Ok(status)
}

/// Appends a status row to a ride's log.
///
/// The row id is a fresh UUID; `created_at` comes from the column
/// default (microsecond precision) so log order follows insert order.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn insert_ride_status(
    conn: &mut MySqlConnection,
    ride_id: &RideId,
    status: RideStatusKind,
) -> Result<(), GatewayError> {
    sqlx::query("INSERT INTO ride_statuses (id, ride_id, status) VALUES (?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(ride_id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fetches a ride by id.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn ride_by_id(
    conn: &mut MySqlConnection,
    ride_id: &RideId,
) -> Result<Option<Ride>, GatewayError> {
    let ride = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = ?")
        .bind(ride_id)
        .fetch_optional(conn)
        .await?;
    Ok(ride)
}

/// Resolves the discount that applies to a fare computation.
///
/// With a ride id, reads the coupon bound via `used_by`; without one,
/// previews the coupon the priority rule would pick (first-ride
/// campaign coupon first, then the oldest unused coupon). Read-only:
/// nothing is consumed.
async fn applicable_discount(
    conn: &mut MySqlConnection,
    user_id: &UserId,
    ride_id: Option<&RideId>,
) -> Result<i32, GatewayError> {
    if let Some(ride_id) = ride_id {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE used_by = ?")
            .bind(ride_id)
            .fetch_optional(conn)
            .await?;
        return Ok(coupon.map_or(0, |c| c.discount));
    }

    let campaign = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons WHERE user_id = ? AND code = 'CP_NEW2024' AND used_by IS NULL",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(coupon) = campaign {
        return Ok(coupon.discount);
    }

    let oldest = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons WHERE user_id = ? AND used_by IS NULL \
         ORDER BY created_at LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(oldest.map_or(0, |c| c.discount))
}

/// Computes the discounted fare for a ride or a hypothetical trip.
///
/// When `ride` is given its coordinates and bound coupon win; otherwise
/// the quote uses `pickup`/`destination` and the coupon the priority
/// rule would select for `user_id`.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn discounted_fare(
    conn: &mut MySqlConnection,
    user_id: &UserId,
    ride: Option<&Ride>,
    pickup: Coordinate,
    destination: Coordinate,
) -> Result<i32, GatewayError> {
    let (pickup, destination, discount) = match ride {
        Some(ride) => {
            let discount = applicable_discount(conn, user_id, Some(&ride.id)).await?;
            (
                ride.pickup_coordinate(),
                ride.destination_coordinate(),
                discount,
            )
        }
        None => {
            let discount = applicable_discount(conn, user_id, None).await?;
            (pickup, destination, discount)
        }
    };
    Ok(domain::fare::discounted_fare(pickup, destination, discount))
}

/// Aggregate evaluation statistics for a chair.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure.
pub async fn chair_stats(
    conn: &mut MySqlConnection,
    chair_id: &crate::domain::ChairId,
) -> Result<NotificationChairStats, GatewayError> {
    let (count, sum) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(1), CAST(COALESCE(SUM(evaluation), 0) AS SIGNED) \
         FROM rides WHERE chair_id = ? AND evaluation IS NOT NULL",
    )
    .bind(chair_id)
    .fetch_one(conn)
    .await?;

    let mut stats = NotificationChairStats {
        total_rides_count: count,
        total_evaluation_avg: 0.0,
    };
    if count > 0 {
        stats.total_evaluation_avg = sum as f64 / count as f64;
    }
    Ok(stats)
}

/// Reads the configured payment gateway base URL from `settings`.
///
/// # Errors
///
/// Returns [`GatewayError::Database`] on store failure, including a
/// missing setting row.
pub async fn payment_gateway_url(conn: &mut MySqlConnection) -> Result<String, GatewayError> {
    let url = sqlx::query_scalar::<_, String>(
        "SELECT value FROM settings WHERE name = 'payment_gateway_url'",
    )
    .fetch_one(conn)
    .await?;
    Ok(url)
}

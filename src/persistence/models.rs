//! Database row models.
//!
//! One struct per table, deriving [`sqlx::FromRow`]. The store is the
//! single source of truth; the in-memory caches hold copies of these
//! rows (see `crate::cache`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::domain::{ChairId, Coordinate, OwnerId, RideId, RideStatusKind, UserId};

/// A registered rider from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub date_of_birth: String,
    pub access_token: String,
    pub invitation_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name shown to chairs: "firstname lastname".
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// A chair-fleet owner from the `owners` table.
#[derive(Debug, Clone, FromRow)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub access_token: String,
    pub chair_register_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chair from the `chairs` table.
#[derive(Debug, Clone, FromRow)]
pub struct Chair {
    pub id: ChairId,
    pub owner_id: OwnerId,
    pub name: String,
    pub model: String,
    pub is_active: bool,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Static reference data from the `chair_models` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChairModel {
    pub name: String,
    /// Grid units covered per unit of time; always positive.
    pub speed: i32,
}

/// A ride request from the `rides` table.
#[derive(Debug, Clone, FromRow)]
pub struct Ride {
    pub id: RideId,
    pub user_id: UserId,
    pub chair_id: Option<ChairId>,
    pub pickup_latitude: i32,
    pub pickup_longitude: i32,
    pub destination_latitude: i32,
    pub destination_longitude: i32,
    pub evaluation: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// Pickup point as a [`Coordinate`].
    #[must_use]
    pub const fn pickup_coordinate(&self) -> Coordinate {
        Coordinate::new(self.pickup_latitude, self.pickup_longitude)
    }

    /// Destination point as a [`Coordinate`].
    #[must_use]
    pub const fn destination_coordinate(&self) -> Coordinate {
        Coordinate::new(self.destination_latitude, self.destination_longitude)
    }
}

/// A row of the append-only `ride_statuses` log.
#[derive(Debug, Clone, FromRow)]
pub struct RideStatus {
    pub id: String,
    pub ride_id: RideId,
    pub status: RideStatusKind,
    pub created_at: DateTime<Utc>,
    /// Set once when the rider stream delivered this status.
    pub app_sent_at: Option<DateTime<Utc>>,
    /// Set once when the chair stream delivered this status.
    pub chair_sent_at: Option<DateTime<Utc>>,
}

/// A coupon from the `coupons` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Coupon {
    pub user_id: UserId,
    pub code: String,
    pub discount: i32,
    pub created_at: DateTime<Utc>,
    /// The ride that consumed this coupon, if any. Immutable once set.
    pub used_by: Option<RideId>,
}

/// A rider's registered payment token.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentToken {
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// A row of the append-only `chair_locations` log.
#[derive(Debug, Clone, FromRow)]
pub struct ChairLocation {
    pub id: String,
    pub chair_id: ChairId,
    pub latitude: i32,
    pub longitude: i32,
    pub created_at: DateTime<Utc>,
}

impl ChairLocation {
    /// The reported point as a [`Coordinate`].
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Running Manhattan-distance total from
/// `chair_locations_total_distance`.
#[derive(Debug, Clone, FromRow)]
pub struct ChairTotalDistance {
    pub chair_id: ChairId,
    pub total_distance: i64,
}

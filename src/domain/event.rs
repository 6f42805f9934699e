//! Lifecycle notification payloads.
//!
//! Every ride transition is fanned out to the rider's and the chair's
//! notification queues as one of these fully-formed payloads. Producers
//! build them (including fare and chair statistics) so the delivery
//! path never touches the store except for acknowledgments.

use serde::Serialize;

use super::coordinate::Coordinate;
use super::ids::{ChairId, RideId, UserId};
use super::ride_status::RideStatusKind;

/// Event delivered on the rider's notification stream.
#[derive(Debug, Clone, Serialize)]
pub struct RideNotification {
    /// The ride the event belongs to.
    pub ride_id: RideId,
    /// Pickup point.
    pub pickup_coordinate: Coordinate,
    /// Destination point.
    pub destination_coordinate: Coordinate,
    /// Discounted fare quoted for the ride.
    pub fare: i32,
    /// The lifecycle status this event announces.
    pub status: RideStatusKind,
    /// Assigned chair, absent until the dispatcher picks one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chair: Option<NotificationChair>,
    /// Ride creation time, milliseconds since epoch.
    pub created_at: i64,
    /// Ride update time, milliseconds since epoch.
    pub updated_at: i64,
}

/// Chair summary embedded in a rider notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationChair {
    pub id: ChairId,
    pub name: String,
    pub model: String,
    pub stats: NotificationChairStats,
}

/// Aggregate evaluation statistics for a chair.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NotificationChairStats {
    /// Number of evaluated rides the chair has carried.
    pub total_rides_count: i64,
    /// Mean evaluation over those rides, 0 when there are none.
    pub total_evaluation_avg: f64,
}

/// Event delivered on the chair's notification stream.
#[derive(Debug, Clone, Serialize)]
pub struct ChairRideNotification {
    /// The ride the event belongs to.
    pub ride_id: RideId,
    /// The rider to pick up.
    pub user: NotificationUser,
    /// Pickup point.
    pub pickup_coordinate: Coordinate,
    /// Destination point.
    pub destination_coordinate: Coordinate,
    /// The lifecycle status this event announces.
    pub status: RideStatusKind,
}

/// Rider summary embedded in a chair notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationUser {
    pub id: UserId,
    /// Display name, "firstname lastname".
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn chair_field_is_omitted_when_unassigned() {
        let event = RideNotification {
            ride_id: RideId::from("r1"),
            pickup_coordinate: Coordinate::new(0, 0),
            destination_coordinate: Coordinate::new(1, 1),
            fare: 700,
            status: RideStatusKind::Matching,
            chair: None,
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(!json.contains("\"chair\""));
        assert!(json.contains("\"status\":\"MATCHING\""));
    }

    #[test]
    fn chair_notification_carries_user_name() {
        let event = ChairRideNotification {
            ride_id: RideId::from("r1"),
            user: NotificationUser {
                id: UserId::from("u1"),
                name: "Ada Lovelace".to_owned(),
            },
            pickup_coordinate: Coordinate::new(0, 0),
            destination_coordinate: Coordinate::new(1, 1),
            status: RideStatusKind::Enroute,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"name\":\"Ada Lovelace\""));
    }
}

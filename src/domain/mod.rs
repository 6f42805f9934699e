//! Domain layer: coordinates, identifiers, the ride state machine,
//! fare arithmetic, and notification event types.

pub mod coordinate;
pub mod event;
pub mod fare;
pub mod ids;
pub mod ride_status;

pub use coordinate::Coordinate;
pub use event::{
    ChairRideNotification, NotificationChair, NotificationChairStats, NotificationUser,
    RideNotification,
};
pub use ids::{ChairId, OwnerId, RideId, UserId};
pub use ride_status::RideStatusKind;

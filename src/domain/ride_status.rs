//! Ride lifecycle state machine.
//!
//! A ride moves through a strictly linear sequence of statuses:
//! MATCHING → ENROUTE → PICKUP → CARRYING → ARRIVED → COMPLETED.
//! CANCELED is a terminal status outside the linear chain. The status
//! log in the store is append-only; this module only defines the legal
//! order, the append sites live in the handlers and the dispatcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A discrete phase of a ride's lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum RideStatusKind {
    /// Waiting for a chair to be assigned.
    Matching,
    /// The chair acknowledged the ride and is heading to the pickup.
    Enroute,
    /// The chair reached the pickup point.
    Pickup,
    /// The rider is on board.
    Carrying,
    /// The chair reached the destination.
    Arrived,
    /// The rider evaluated the ride and payment was accepted.
    Completed,
    /// The ride was canceled.
    Canceled,
}

impl RideStatusKind {
    /// The canonical string form stored in the database and sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matching => "MATCHING",
            Self::Enroute => "ENROUTE",
            Self::Pickup => "PICKUP",
            Self::Carrying => "CARRYING",
            Self::Arrived => "ARRIVED",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }

    /// The only status allowed to follow this one, if any.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Matching => Some(Self::Enroute),
            Self::Enroute => Some(Self::Pickup),
            Self::Pickup => Some(Self::Carrying),
            Self::Carrying => Some(Self::Arrived),
            Self::Arrived => Some(Self::Completed),
            Self::Completed | Self::Canceled => None,
        }
    }

    /// Whether the ride has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

impl fmt::Display for RideStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MATCHING" => Ok(Self::Matching),
            "ENROUTE" => Ok(Self::Enroute),
            "PICKUP" => Ok(Self::Pickup),
            "CARRYING" => Ok(Self::Carrying),
            "ARRIVED" => Ok(Self::Arrived),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(format!("unknown ride status: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_linear_and_terminates() {
        let mut status = RideStatusKind::Matching;
        let mut seen = vec![status];
        while let Some(next) = status.successor() {
            status = next;
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                RideStatusKind::Matching,
                RideStatusKind::Enroute,
                RideStatusKind::Pickup,
                RideStatusKind::Carrying,
                RideStatusKind::Arrived,
                RideStatusKind::Completed,
            ]
        );
    }

    #[test]
    fn terminal_statuses_have_no_successor() {
        assert!(RideStatusKind::Completed.is_terminal());
        assert!(RideStatusKind::Canceled.is_terminal());
        assert_eq!(RideStatusKind::Completed.successor(), None);
        assert_eq!(RideStatusKind::Canceled.successor(), None);
    }

    #[test]
    fn wire_form_round_trips() {
        for status in [
            RideStatusKind::Matching,
            RideStatusKind::Enroute,
            RideStatusKind::Pickup,
            RideStatusKind::Carrying,
            RideStatusKind::Arrived,
            RideStatusKind::Completed,
            RideStatusKind::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<RideStatusKind>(), Ok(status));
        }
    }

    #[test]
    fn serde_uses_uppercase() {
        let json = serde_json::to_string(&RideStatusKind::Enroute).ok();
        assert_eq!(json.as_deref(), Some(r#""ENROUTE""#));
    }
}

//! Ride status and the edges between statuses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a ride is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Searching,
    Accepted,
    Arriving,
    Arrived,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 7] = [
        RideStatus::Searching,
        RideStatus::Accepted,
        RideStatus::Arriving,
        RideStatus::Arrived,
        RideStatus::Started,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    /// Statuses reachable in one step from `self`.
    ///
    /// `Searching` appears as a successor of the pre-start statuses only for
    /// the captain-initiated requeue.
    pub fn successors(self) -> &'static [RideStatus] {
        use RideStatus::*;
        match self {
            Searching => &[Accepted, Cancelled],
            Accepted => &[Arriving, Arrived, Cancelled, Searching],
            Arriving => &[Arrived, Cancelled, Searching],
            Arrived => &[Started, Cancelled, Searching],
            Started => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: RideStatus) -> bool {
        self.successors().contains(&next)
    }

    /// A ride in one of these statuses blocks its rider (and captain) from
    /// holding another.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RideStatus::Searching
                | RideStatus::Accepted
                | RideStatus::Arriving
                | RideStatus::Arrived
                | RideStatus::Started
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Whether the ride must carry a captain reference in this status.
    pub fn has_captain(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted
                | RideStatus::Arriving
                | RideStatus::Arrived
                | RideStatus::Started
                | RideStatus::Completed
        )
    }

    /// Statuses during which location samples are appended to the ride.
    pub fn accepts_tracking(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted | RideStatus::Arriving | RideStatus::Arrived | RideStatus::Started
        )
    }

    /// Statuses from which the ride may still be cancelled.
    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(RideStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Searching => "searching",
            RideStatus::Accepted => "accepted",
            RideStatus::Arriving => "arriving",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

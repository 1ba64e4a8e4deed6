//! Notification routing.
//!
//! Notifications carry no typed intent, so it is recovered here from the
//! free text. Nothing outside this module looks at notification wording.

use crate::models::{BookingId, Notification, VenueId};

/// What activating a notification leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    /// Ask the customer to review a past booking.
    Review {
        booking_id: BookingId,
        venue_name: String,
    },
    /// A venue awaits moderation.
    Verification { venue_id: VenueId },
    Generic,
}

const DEFAULT_VENUE_NAME: &str = "Venue";

impl NotificationIntent {
    pub fn classify(n: &Notification) -> Self {
        if let Some(booking_id) = n.booking_id {
            if n.message.to_lowercase().contains("review")
                || n.title.to_lowercase().contains("experience")
            {
                return Self::Review {
                    booking_id,
                    venue_name: venue_name(&n.message),
                };
            }
        }
        if let (Some("verification"), Some(venue_id)) = (n.kind.as_deref(), n.venue_id) {
            return Self::Verification { venue_id };
        }
        Self::Generic
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Review {
                booking_id,
                venue_name,
            } => format!("Review your booking #{} at {}", booking_id, venue_name),
            Self::Verification { venue_id } => {
                format!("Venue #{} is awaiting verification", venue_id)
            }
            Self::Generic => "No action".to_string(),
        }
    }
}

/// "How was your experience at Grand Hall? ..." -> "Grand Hall"
fn venue_name(message: &str) -> String {
    message
        .split(" at ")
        .nth(1)
        .and_then(|rest| rest.split('?').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_VENUE_NAME)
        .to_string()
}

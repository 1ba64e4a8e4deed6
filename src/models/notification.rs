//! System notification models

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::wire;
use super::{BookingId, NotificationId, VenueId};

/// Booking/venue/verification notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_read: bool,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub venue_id: Option<VenueId>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// `GET /api/users/{id}/notifications` envelope.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

//! Numeric identifiers used by the backend.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                super::wire::string_or_u64(d).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

numeric_id!(
    /// A user account (customer, owner or admin).
    UserId
);
numeric_id!(
    /// A conversation thread.
    ConversationId
);
numeric_id!(NotificationId);
numeric_id!(BookingId);
numeric_id!(VenueId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_id_handles_null_and_missing() {
        #[derive(Deserialize)]
        struct Row {
            owner: Option<UserId>,
            venue: Option<VenueId>,
        }
        let row: Row = serde_json::from_str(r#"{"owner": null}"#).unwrap();
        assert!(row.owner.is_none());
        assert!(row.venue.is_none());

        let row: Row = serde_json::from_str(r#"{"owner": "7", "venue": 3}"#).unwrap();
        assert_eq!(row.owner, Some(UserId(7)));
        assert_eq!(row.venue, Some(VenueId(3)));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&ConversationId(42)).unwrap();
        assert_eq!(json, "42");
    }
}

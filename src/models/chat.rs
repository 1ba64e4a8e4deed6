//! Conversation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;
use super::{ConversationId, UserId, VenueId};

/// The assistant counterparty. Always online, never asked for status.
pub const ASSISTANT_ID: UserId = UserId(4);

/// Display name of the assistant conversation.
pub const ASSISTANT_NAME: &str = "VenueBot";

/// `conversation_type` of customer <-> admin threads; everything else is
/// customer <-> owner.
const CUSTOMER_ADMIN: &str = "customer_admin";

/// Conversation summary as returned by `GET /api/users/{id}/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conversation_type: Option<String>,
    /// The customer side of the thread.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub admin_id: Option<UserId>,
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
    #[serde(default)]
    pub venue_id: Option<VenueId>,
    #[serde(default, deserialize_with = "wire::count")]
    pub unread: u32,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub last_message_time: Option<DateTime<Utc>>,
}

/// Who sits on the other side of a conversation, from the viewer's seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// Viewer is the admin/owner; the other side is a customer.
    Customer,
    /// Viewer is the customer talking to a venue owner.
    Owner,
    /// Viewer is the customer talking to an admin.
    Admin,
    /// The assistant.
    Bot,
}

impl ConversationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConversationKind::Customer => "customer",
            ConversationKind::Owner => "owner",
            ConversationKind::Admin => "admin",
            ConversationKind::Bot => "assistant",
        }
    }
}

/// Conversation as held by the client: the record resolved once against
/// the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub name: String,
    pub kind: ConversationKind,
    /// Id whose presence is shown in the header. `None` when the backend
    /// did not say.
    pub counterparty: Option<UserId>,
    /// Venue the thread is about, for owner threads.
    pub venue: Option<VenueId>,
    pub unread: u32,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// Classify the record for `viewer`.
    pub fn resolve(self, viewer: UserId) -> ConversationSummary {
        let (kind, counterparty) = if self.admin_id == Some(ASSISTANT_ID) {
            (ConversationKind::Bot, Some(ASSISTANT_ID))
        } else if self.user_id == Some(viewer) {
            if self.conversation_type.as_deref() == Some(CUSTOMER_ADMIN) {
                (ConversationKind::Admin, self.admin_id)
            } else {
                (ConversationKind::Owner, self.owner_user_id)
            }
        } else {
            (ConversationKind::Customer, self.user_id)
        };

        let name = match kind {
            ConversationKind::Bot => ASSISTANT_NAME.to_string(),
            _ => self.name,
        };

        ConversationSummary {
            id: self.conversation_id,
            name,
            kind,
            counterparty,
            venue: self.venue_id,
            unread: self.unread,
            last_message: self.last_message,
            last_message_at: self.last_message_time,
        }
    }
}

impl ConversationSummary {
    /// Client-side entry for the assistant thread once its id is known.
    pub fn assistant(id: ConversationId) -> Self {
        Self {
            id,
            name: ASSISTANT_NAME.to_string(),
            kind: ConversationKind::Bot,
            counterparty: Some(ASSISTANT_ID),
            venue: None,
            unread: 0,
            last_message: None,
            last_message_at: None,
        }
    }

    /// Client-side entry for a freshly created owner thread.
    pub fn with_owner(id: ConversationId, name: &str, owner: UserId, venue: VenueId) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: ConversationKind::Owner,
            counterparty: Some(owner),
            venue: Some(venue),
            unread: 0,
            last_message: None,
            last_message_at: None,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.kind == ConversationKind::Bot
    }
}

/// `POST /api/users/conversations` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewConversation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<VenueId>,
}

impl NewConversation {
    pub fn assistant() -> Self {
        Self {
            admin_id: Some(ASSISTANT_ID),
            ..Self::default()
        }
    }

    pub fn venue_owner(owner: UserId, venue: VenueId) -> Self {
        Self {
            owner_id: Some(owner),
            venue_id: Some(venue),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedConversation {
    pub conversation_id: ConversationId,
}

//! Realtime event vocabulary. Event names are the wire contract.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::models::{ConversationId, Message, Notification, StatusUpdate, UserId};

/// Events the client emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    JoinConversation {
        conversation_id: ConversationId,
    },
    SendMessage {
        conversation_id: ConversationId,
        content: String,
        sender_id: UserId,
    },
    RequestStatus {
        user_id: UserId,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinConversation { .. } => "join_conversation",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::RequestStatus { .. } => "request_status",
        }
    }

    /// Encode as a Socket.IO event frame.
    pub fn to_frame(&self) -> Result<String> {
        super::frame::encode_event(self.name(), self)
            .with_context(|| format!("Failed to encode {}", self.name()))
    }
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NewMessage(Message),
    UserStatus(StatusUpdate),
    NewNotification(Notification),
    /// Anything we do not consume (kept for logging).
    Other(String),
}

impl ServerEvent {
    pub fn parse(name: &str, data: Value) -> Result<Self> {
        let event = match name {
            "new_message" => Self::NewMessage(
                serde_json::from_value(data).context("Malformed new_message payload")?,
            ),
            "user_status" => Self::UserStatus(
                serde_json::from_value(data).context("Malformed user_status payload")?,
            ),
            "new_notification" => Self::NewNotification(
                serde_json::from_value(data).context("Malformed new_notification payload")?,
            ),
            other => Self::Other(other.to_string()),
        };
        Ok(event)
    }
}

//! Message-related models

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::wire;
use super::{ConversationId, UserId};

/// Chat message, from history fetches and `new_message` events.
///
/// `content` is markdown text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_read: bool,
}

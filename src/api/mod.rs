//! REST API for conversations and notifications

mod chat;
pub mod client;
mod notifications;

use std::future::Future;

use anyhow::{Context, Result};

use crate::models::{
    ConversationId, ConversationRecord, CreatedConversation, Message, NewConversation,
    Notification, NotificationId, NotificationList, UserId,
};

pub use chat::{list_conversations, preview, read_messages, start_conversation, StartTarget};
pub use client::ApiClient;
pub use notifications::{list_notifications, mark_all_read, mark_read, open_notification};

/// The REST calls the chat core depends on.
pub trait ChatApi: Send + Sync + 'static {
    /// `GET /api/users/{user}/conversations`
    fn conversations(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<ConversationRecord>>> + Send;

    /// `GET /api/users/conversations/{id}/messages`
    fn messages(
        &self,
        conversation: ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// `POST /api/users/conversations`; returns the new or existing id.
    fn create_conversation(
        &self,
        body: NewConversation,
    ) -> impl Future<Output = Result<ConversationId>> + Send;

    /// `GET /api/users/{user}/notifications`
    fn notifications(&self, user: UserId)
        -> impl Future<Output = Result<Vec<Notification>>> + Send;

    /// `PUT /api/notifications/{id}/read`
    fn mark_notification_read(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `PUT /api/users/{user}/notifications/read-all`
    fn mark_all_notifications_read(&self, user: UserId)
        -> impl Future<Output = Result<()>> + Send;
}

impl ChatApi for ApiClient {
    async fn conversations(&self, user: UserId) -> Result<Vec<ConversationRecord>> {
        self.get_json(&format!("/api/users/{}/conversations", user))
            .await
            .context("Failed to load conversations")
    }

    async fn messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
        self.get_json(&format!(
            "/api/users/conversations/{}/messages",
            conversation
        ))
        .await
        .with_context(|| format!("Failed to load messages of conversation {}", conversation))
    }

    async fn create_conversation(&self, body: NewConversation) -> Result<ConversationId> {
        let created: CreatedConversation = self
            .post_json("/api/users/conversations", &body)
            .await
            .context("Failed to create conversation")?;
        Ok(created.conversation_id)
    }

    async fn notifications(&self, user: UserId) -> Result<Vec<Notification>> {
        let list: NotificationList = self
            .get_json(&format!("/api/users/{}/notifications", user))
            .await
            .context("Failed to load notifications")?;
        Ok(list.notifications)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        self.put(&format!("/api/notifications/{}/read", id))
            .await
            .with_context(|| format!("Failed to mark notification {} read", id))
    }

    async fn mark_all_notifications_read(&self, user: UserId) -> Result<()> {
        self.put(&format!("/api/users/{}/notifications/read-all", user))
            .await
            .context("Failed to mark notifications read")
    }
}

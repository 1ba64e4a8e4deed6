//! Chat state machine.
//!
//! `ChatState` never does I/O. Every input (user action, realtime event,
//! fetch result) goes through a method that mutates state and returns the
//! [`Command`]s the caller must execute. Fetch results carry the key they
//! were requested for and are dropped if that key is no longer current.

use anyhow::Result;

use super::conversations::ConversationStore;
use super::intent::NotificationIntent;
use super::messages::MessageStream;
use super::notifications::NotificationFeed;
use super::presence::PresenceTracker;
use crate::models::{
    ConversationId, ConversationRecord, ConversationSummary, Message, NewConversation,
    Notification, NotificationId, Session, UserId, VenueId,
};
use crate::realtime::{ClientEvent, ConnectionEvent, ConnectionId, LinkEvent, ServerEvent};

/// REST work for the backend executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    LoadConversations { user: UserId },
    LoadMessages { conversation: ConversationId },
    CreateConversation {
        user: UserId,
        body: NewConversation,
        then: PendingOpen,
    },
    LoadNotifications { user: UserId },
    MarkNotificationRead { id: NotificationId },
    MarkAllNotificationsRead { user: UserId },
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Api(Request),
    Emit(ClientEvent),
}

/// What to open once a conversation has been created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOpen {
    Assistant,
    Venue {
        name: String,
        owner: UserId,
        venue: VenueId,
    },
}

/// Result of a [`Request`], keyed like the request.
#[derive(Debug)]
pub enum Response {
    Conversations {
        user: UserId,
        result: Result<Vec<ConversationRecord>>,
    },
    Messages {
        conversation: ConversationId,
        result: Result<Vec<Message>>,
    },
    ConversationCreated {
        user: UserId,
        then: PendingOpen,
        result: Result<ConversationId>,
    },
    Notifications {
        user: UserId,
        result: Result<Vec<Notification>>,
    },
    NotificationMarked {
        id: NotificationId,
        result: Result<()>,
    },
    AllNotificationsMarked {
        result: Result<()>,
    },
}

/// Realtime link as the UI shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Offline,
    Connecting,
    Online,
    Reconnecting,
    /// Retries exhausted; chat runs without live updates.
    Failed,
}

impl LinkState {
    pub fn label(&self) -> &'static str {
        match self {
            LinkState::Offline => "offline",
            LinkState::Connecting => "connecting",
            LinkState::Online => "live",
            LinkState::Reconnecting => "reconnecting",
            LinkState::Failed => "no live updates",
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatState {
    viewer: Option<Session>,
    connection: Option<ConnectionId>,
    link: LinkState,
    chat_open: bool,
    active: Option<ConversationSummary>,
    pub conversations: ConversationStore,
    pub stream: MessageStream,
    pub presence: PresenceTracker,
    pub notifications: NotificationFeed,
}

fn load_conversations(user: UserId) -> Command {
    Command::Api(Request::LoadConversations { user })
}

impl ChatState {
    pub fn viewer(&self) -> Option<&Session> {
        self.viewer.as_ref()
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn active(&self) -> Option<&ConversationSummary> {
        self.active.as_ref()
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations.total_unread()
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.unread_count()
    }

    fn viewer_id(&self) -> Option<UserId> {
        self.viewer.as_ref().map(|s| s.id)
    }

    /// Follow login state. A different user starts from a clean slate and
    /// loads their conversations and notifications.
    pub fn set_session(&mut self, session: Option<Session>) -> Vec<Command> {
        if self.viewer_id() == session.as_ref().map(|s| s.id) {
            self.viewer = session;
            return Vec::new();
        }

        let chat_open = self.chat_open;
        *self = Self {
            chat_open,
            ..Self::default()
        };
        self.viewer = session;

        match self.viewer_id() {
            Some(user) => vec![
                load_conversations(user),
                Command::Api(Request::LoadNotifications { user }),
            ],
            None => Vec::new(),
        }
    }

    /// Bind to the connection whose events count from now on.
    pub fn attach_connection(&mut self, connection: Option<ConnectionId>) {
        if self.connection != connection {
            self.connection = connection;
            self.link = match connection {
                Some(_) => LinkState::Connecting,
                None => LinkState::Offline,
            };
        }
    }

    pub fn set_chat_open(&mut self, open: bool) -> Vec<Command> {
        let opening = open && !self.chat_open;
        self.chat_open = open;
        if opening {
            self.refresh_conversations()
        } else {
            Vec::new()
        }
    }

    pub fn refresh_conversations(&self) -> Vec<Command> {
        self.viewer_id().map(load_conversations).into_iter().collect()
    }

    pub fn refresh_notifications(&self) -> Vec<Command> {
        self.viewer_id()
            .map(|user| Command::Api(Request::LoadNotifications { user }))
            .into_iter()
            .collect()
    }

    /// Open a conversation from the list.
    pub fn open_conversation(&mut self, id: ConversationId) -> Vec<Command> {
        match self.conversations.get(id).cloned() {
            Some(summary) => self.open_summary(summary),
            None => {
                tracing::warn!("Cannot open unknown conversation {}", id);
                Vec::new()
            }
        }
    }

    /// Make `summary` active: clear the stream now, then fetch history,
    /// ask for presence and join the room.
    fn open_summary(&mut self, summary: ConversationSummary) -> Vec<Command> {
        if self.viewer.is_none() {
            return Vec::new();
        }
        let id = summary.id;
        tracing::info!("Opening conversation {} ({})", id, summary.kind.label());

        self.stream.open(id);
        let status_request = self.presence.track(summary.counterparty);
        self.active = Some(summary);

        let mut commands = vec![Command::Api(Request::LoadMessages { conversation: id })];
        commands.extend(status_request.map(Command::Emit));
        commands.push(Command::Emit(ClientEvent::JoinConversation {
            conversation_id: id,
        }));
        commands
    }

    pub fn close_conversation(&mut self) {
        self.active = None;
        self.stream.close();
        self.presence.untrack();
    }

    /// Create or fetch the assistant thread, then open it.
    pub fn start_assistant_chat(&self) -> Vec<Command> {
        self.create_and_open(NewConversation::assistant(), PendingOpen::Assistant)
    }

    /// Create or fetch a thread with a venue's owner, then open it.
    pub fn contact_owner(&self, owner: UserId, venue: VenueId, venue_name: &str) -> Vec<Command> {
        self.create_and_open(
            NewConversation::venue_owner(owner, venue),
            PendingOpen::Venue {
                name: venue_name.to_string(),
                owner,
                venue,
            },
        )
    }

    fn create_and_open(&self, body: NewConversation, then: PendingOpen) -> Vec<Command> {
        match self.viewer_id() {
            Some(user) => vec![Command::Api(Request::CreateConversation { user, body, then })],
            None => Vec::new(),
        }
    }

    /// Emit a message to the active conversation. Nothing is appended
    /// locally; the message shows up when the server echoes it.
    pub fn send_message(&self, content: &str) -> Vec<Command> {
        if content.trim().is_empty() {
            return Vec::new();
        }
        let (Some(sender_id), Some(active)) = (self.viewer_id(), self.active.as_ref()) else {
            return Vec::new();
        };
        vec![Command::Emit(ClientEvent::SendMessage {
            conversation_id: active.id,
            content: content.to_string(),
            sender_id,
        })]
    }

    /// Ask for a user's presence outside any conversation.
    pub fn watch_presence(&mut self, user: UserId) -> Vec<Command> {
        self.presence
            .track(Some(user))
            .map(Command::Emit)
            .into_iter()
            .collect()
    }

    /// Optimistically mark one notification read. No rollback if the
    /// backend call fails.
    pub fn mark_notification_read(&mut self, id: NotificationId) -> Vec<Command> {
        let unread = self.notifications.get(id).is_some_and(|n| !n.is_read);
        if !unread {
            return Vec::new();
        }
        self.notifications.mark_read(id);
        vec![Command::Api(Request::MarkNotificationRead { id })]
    }

    /// Optimistically mark everything read with one backend call.
    pub fn mark_all_notifications_read(&mut self) -> Vec<Command> {
        self.notifications.mark_all_read();
        match self.viewer_id() {
            Some(user) => vec![Command::Api(Request::MarkAllNotificationsRead { user })],
            None => Vec::new(),
        }
    }

    /// Activate a notification: mark it read and route it.
    pub fn activate_notification(
        &mut self,
        id: NotificationId,
    ) -> Option<(NotificationIntent, Vec<Command>)> {
        let intent = NotificationIntent::classify(self.notifications.get(id)?);
        let commands = self.mark_notification_read(id);
        Some((intent, commands))
    }

    /// Apply a connection event. Events of any connection other than the
    /// attached one are leftovers and are ignored.
    pub fn handle_connection(&mut self, event: ConnectionEvent) -> Vec<Command> {
        if Some(event.connection) != self.connection {
            tracing::debug!("Ignoring event of stale connection {}", event.connection);
            return Vec::new();
        }

        match event.kind {
            LinkEvent::Connected => {
                self.link = LinkState::Online;
                // Rooms and status requests do not survive a reconnect.
                let mut commands = self.refresh_conversations();
                if let Some(active) = &self.active {
                    commands.push(Command::Emit(ClientEvent::JoinConversation {
                        conversation_id: active.id,
                    }));
                }
                commands.extend(self.presence.request().map(Command::Emit));
                commands
            }
            LinkEvent::Disconnected { reason } => {
                tracing::warn!("Realtime link lost: {}", reason);
                self.link = LinkState::Reconnecting;
                Vec::new()
            }
            LinkEvent::Failed { reason } => {
                tracing::warn!("Realtime link failed, continuing without it: {}", reason);
                self.link = LinkState::Failed;
                Vec::new()
            }
            LinkEvent::Message(event) => self.handle_event(event),
        }
    }

    fn handle_event(&mut self, event: ServerEvent) -> Vec<Command> {
        match event {
            ServerEvent::NewMessage(message) => {
                let conversation = message.conversation_id;
                if !self.stream.push(message) {
                    tracing::debug!("Message for inactive conversation {}", conversation);
                }
                // Previews and unread counts of every conversation stay live.
                self.refresh_conversations()
            }
            ServerEvent::UserStatus(update) => {
                self.presence.apply(&update);
                Vec::new()
            }
            ServerEvent::NewNotification(notification) => {
                tracing::info!("Notification: {}", notification.title);
                self.notifications.prepend(notification);
                Vec::new()
            }
            ServerEvent::Other(name) => {
                tracing::debug!("Unhandled realtime event {}", name);
                Vec::new()
            }
        }
    }

    pub fn handle_response(&mut self, response: Response) -> Vec<Command> {
        match response {
            Response::Conversations { user, result } => {
                if self.viewer_id() != Some(user) {
                    tracing::debug!("Discarding conversations of user {}", user);
                    return Vec::new();
                }
                match result {
                    Ok(records) => {
                        self.conversations.replace(records, user);
                        self.sync_active();
                    }
                    Err(e) => tracing::warn!("{:#}", e),
                }
                Vec::new()
            }
            Response::Messages {
                conversation,
                result,
            } => match result {
                Ok(history) => {
                    if self.stream.load(conversation, history) {
                        // The fetch marks the thread read server-side.
                        self.refresh_conversations()
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    self.stream.load_failed(conversation);
                    Vec::new()
                }
            },
            Response::ConversationCreated { user, then, result } => {
                if self.viewer_id() != Some(user) {
                    tracing::debug!("Discarding conversation created for user {}", user);
                    return Vec::new();
                }
                match result {
                    Ok(id) => {
                        let summary = self.created_summary(id, then);
                        self.conversations.insert(summary.clone());
                        let mut commands = self.refresh_conversations();
                        commands.extend(self.open_summary(summary));
                        commands
                    }
                    Err(e) => {
                        tracing::warn!("{:#}", e);
                        Vec::new()
                    }
                }
            }
            Response::Notifications { user, result } => {
                if self.viewer_id() != Some(user) {
                    tracing::debug!("Discarding notifications of user {}", user);
                    return Vec::new();
                }
                match result {
                    Ok(items) => self.notifications.replace(items),
                    Err(e) => tracing::warn!("{:#}", e),
                }
                Vec::new()
            }
            Response::NotificationMarked { id, result } => {
                if let Err(e) = result {
                    tracing::warn!("{:#} (notification {} stays read locally)", e, id);
                }
                Vec::new()
            }
            Response::AllNotificationsMarked { result } => {
                if let Err(e) = result {
                    tracing::warn!("{:#} (notifications stay read locally)", e);
                }
                Vec::new()
            }
        }
    }

    fn created_summary(&self, id: ConversationId, then: PendingOpen) -> ConversationSummary {
        if let Some(existing) = self.conversations.get(id) {
            return existing.clone();
        }
        match then {
            PendingOpen::Assistant => ConversationSummary::assistant(id),
            PendingOpen::Venue { name, owner, venue } => {
                ConversationSummary::with_owner(id, &name, owner, venue)
            }
        }
    }

    /// Keep the active header in step with the refreshed listing.
    fn sync_active(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if let Some(fresh) = self.conversations.get(active.id) {
                active.name = fresh.name.clone();
                active.venue = fresh.venue;
                active.unread = fresh.unread;
                active.last_message = fresh.last_message.clone();
                active.last_message_at = fresh.last_message_at;
            }
        }
    }
}

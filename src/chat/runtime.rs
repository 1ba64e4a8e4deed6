//! Session-scoped container: one connection manager, one backend, one
//! state machine, all driven from a single task.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use super::backend::Backend;
use super::state::{ChatState, Command, Response};
use crate::api::ChatApi;
use crate::auth::StoredSession;
use crate::realtime::{
    ConnectionEvent, ConnectionManager, Connector, LinkEvent, ReconnectPolicy, WsConnector,
};

/// What [`ChatRuntime::next`] just applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// An event of the live connection.
    Link(LinkEvent),
    /// A backend result.
    Fetched(Fetched),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Conversations,
    Messages,
    ConversationCreated,
    Notifications,
    NotificationsMarked,
}

impl From<&Response> for Fetched {
    fn from(response: &Response) -> Self {
        match response {
            Response::Conversations { .. } => Fetched::Conversations,
            Response::Messages { .. } => Fetched::Messages,
            Response::ConversationCreated { .. } => Fetched::ConversationCreated,
            Response::Notifications { .. } => Fetched::Notifications,
            Response::NotificationMarked { .. } | Response::AllNotificationsMarked { .. } => {
                Fetched::NotificationsMarked
            }
        }
    }
}

pub struct ChatRuntime<C: Connector = WsConnector> {
    state: ChatState,
    backend: Backend,
    connections: ConnectionManager<C>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl<C: Connector> ChatRuntime<C> {
    pub fn new<A: ChatApi>(
        api: Arc<A>,
        connector: Arc<C>,
        api_base: &str,
        policy: ReconnectPolicy,
    ) -> Self {
        let (connections, events) = ConnectionManager::new(connector, api_base, policy);
        Self {
            state: ChatState::default(),
            backend: Backend::start(api),
            connections,
            events,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Follow login state: swap the connection (old one fully closed
    /// first) and reset the chat state for a new user.
    pub async fn set_session(&mut self, session: Option<&StoredSession>) -> Result<()> {
        let commands = self.state.set_session(session.map(|s| s.user.clone()));
        let connection = self.connections.set_session(session).await?;
        self.state.attach_connection(connection);
        self.dispatch(commands);
        Ok(())
    }

    /// Run a user action against the state and execute what it asks for.
    pub fn apply<F>(&mut self, action: F)
    where
        F: FnOnce(&mut ChatState) -> Vec<Command>,
    {
        let commands = action(&mut self.state);
        self.dispatch(commands);
    }

    fn dispatch(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Api(request) => self.backend.send(request),
                Command::Emit(event) => match self.connections.emitter() {
                    Some(emitter) => {
                        if !emitter.emit(event) {
                            tracing::warn!("Connection {} is gone", emitter.connection());
                        }
                    }
                    None => tracing::debug!("No connection; dropping {}", event.name()),
                },
            }
        }
    }

    /// Wait for the next backend result or event of the live connection,
    /// apply it and execute the follow-up commands.
    pub async fn next(&mut self) -> Option<Update> {
        loop {
            tokio::select! {
                Some(response) = self.backend.recv() => {
                    let fetched = Fetched::from(&response);
                    let commands = self.state.handle_response(response);
                    self.dispatch(commands);
                    return Some(Update::Fetched(fetched));
                }
                Some(event) = self.events.recv() => {
                    if Some(event.connection) != self.state.connection() {
                        tracing::debug!("Dropping event of closed connection {}", event.connection);
                        continue;
                    }
                    let kind = event.kind.clone();
                    let commands = self.state.handle_connection(event);
                    self.dispatch(commands);
                    return Some(Update::Link(kind));
                }
                else => return None,
            }
        }
    }

    /// Close the connection and wait for the socket to go.
    pub async fn shutdown(mut self) {
        self.connections.disconnect().await;
    }
}

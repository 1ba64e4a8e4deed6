//! Realtime channel: one socket.io connection per logged-in session.
//!
//! The connection runs in its own task. It reports lifecycle changes and
//! server events on a channel, tagged with a [`ConnectionId`] so consumers
//! can tell a live connection's events from a torn-down one's.

mod connection;
pub mod events;
pub mod frame;
pub mod websocket;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::auth::StoredSession;
use crate::config::RealtimeConfig;
use crate::models::UserId;

pub use events::{ClientEvent, ServerEvent};
pub use websocket::{Connector, WsConnector};

/// Identity of one connection lifetime (reconnects keep it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    /// Lost the link; a retry is scheduled.
    Disconnected { reason: String },
    /// Retry budget exhausted or server ended the session. The task is gone.
    Failed { reason: String },
    Message(ServerEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub connection: ConnectionId,
    pub kind: LinkEvent,
}

/// Fixed-delay, bounded reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

impl From<&RealtimeConfig> for ReconnectPolicy {
    fn from(cfg: &RealtimeConfig) -> Self {
        Self {
            attempts: cfg.reconnect_attempts,
            delay: Duration::from_millis(cfg.reconnect_delay_ms),
        }
    }
}

/// Send side of the live connection.
#[derive(Clone)]
pub struct Emitter {
    connection: ConnectionId,
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl Emitter {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Queue an event. Returns false once the connection is gone.
    pub fn emit(&self, event: ClientEvent) -> bool {
        tracing::debug!("Emit {} on {}", event.name(), self.connection);
        self.tx.send(event).is_ok()
    }
}

struct Live {
    id: ConnectionId,
    user: UserId,
    token: String,
    emitter: Emitter,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Owns the single realtime connection of a session.
pub struct ConnectionManager<C: Connector = WsConnector> {
    connector: Arc<C>,
    api_base: String,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    live: Option<Live>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create an idle manager and the receiver its connections report to.
    pub fn new(
        connector: Arc<C>,
        api_base: &str,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            connector,
            api_base: api_base.to_string(),
            policy,
            events,
            live: None,
        };
        (manager, rx)
    }

    /// Follow the session: keep the connection if the session is unchanged,
    /// otherwise tear the old one down completely before opening another.
    ///
    /// Returns the id of the connection now in place, if any.
    pub async fn set_session(
        &mut self,
        session: Option<&StoredSession>,
    ) -> Result<Option<ConnectionId>> {
        if let (Some(s), Some(live)) = (session, &self.live) {
            if live.user == s.user.id && live.token == s.token && !live.task.is_finished() {
                return Ok(Some(live.id));
            }
        }

        self.disconnect().await;

        let Some(session) = session else {
            return Ok(None);
        };

        let url = websocket::socket_url(&self.api_base, &session.token)?;
        let id = ConnectionId::new();
        let (tx, outgoing) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown) = oneshot::channel();

        let task = connection::Task {
            connector: Arc::clone(&self.connector),
            url,
            id,
            policy: self.policy,
            outgoing,
            shutdown,
            events: self.events.clone(),
        };

        tracing::info!("Opening connection {} for user {}", id, session.user.id);
        let handle = tokio::spawn(task.run());

        self.live = Some(Live {
            id,
            user: session.user.id,
            token: session.token.clone(),
            emitter: Emitter {
                connection: id,
                tx,
            },
            shutdown: Some(shutdown_tx),
            task: handle,
        });

        Ok(Some(id))
    }

    /// Close the current connection and wait until its socket is closed.
    pub async fn disconnect(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        tracing::info!("Closing connection {}", live.id);
        if let Some(tx) = live.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = live.task.await {
            tracing::warn!("Connection task {} ended abnormally: {}", live.id, e);
        }
    }

    pub fn emitter(&self) -> Option<Emitter> {
        self.live.as_ref().map(|l| l.emitter.clone())
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        // Cannot await here; the task closes its socket on the signal.
        if let Some(live) = self.live.as_mut() {
            if let Some(tx) = live.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory scripted connector.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use tokio::sync::mpsc;

    use super::websocket::Transport;
    use super::{ConnectionId, Connector};

    pub fn connection_id() -> ConnectionId {
        ConnectionId::new()
    }

    pub const OPEN: &str = r#"0{"sid":"eio","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    pub const CONNECTED: &str = r#"40{"sid":"sio"}"#;

    /// Test-side end of one accepted connection.
    pub struct Peer {
        pub to_client: mpsc::UnboundedSender<String>,
        pub from_client: mpsc::UnboundedReceiver<String>,
    }

    impl Peer {
        /// Next frame the client sent, skipping heartbeat replies.
        pub async fn next_sent(&mut self) -> Option<String> {
            loop {
                let frame = self.from_client.recv().await?;
                if frame != "3" {
                    return Some(frame);
                }
            }
        }

        pub fn push(&self, frame: &str) {
            self.to_client.send(frame.to_string()).unwrap();
        }
    }

    enum Plan {
        Refuse,
        Accept(MockTransport),
    }

    #[derive(Default)]
    pub struct Counters {
        pub opened: AtomicUsize,
        pub closed: AtomicUsize,
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
        pub urls: Mutex<Vec<String>>,
    }

    #[derive(Default)]
    pub struct MockConnector {
        plans: Mutex<VecDeque<Plan>>,
        pub counters: Arc<Counters>,
    }

    impl MockConnector {
        /// Next connect fails.
        pub fn refuse(&self) {
            self.plans.lock().unwrap().push_back(Plan::Refuse);
        }

        /// Next connect succeeds; frames pushed to the peer before the
        /// client reads them are delivered in order.
        pub fn accept(&self) -> Peer {
            let (to_client, incoming) = mpsc::unbounded_channel();
            let (outgoing, from_client) = mpsc::unbounded_channel();
            self.plans.lock().unwrap().push_back(Plan::Accept(MockTransport {
                incoming,
                outgoing,
                counters: Arc::clone(&self.counters),
                closed: false,
            }));
            Peer {
                to_client,
                from_client,
            }
        }

        /// Accept and pre-load a successful handshake.
        pub fn accept_handshake(&self) -> Peer {
            let peer = self.accept();
            peer.push(OPEN);
            peer.push(CONNECTED);
            peer
        }

        pub fn opened(&self) -> usize {
            self.counters.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.counters.closed.load(Ordering::SeqCst)
        }

        pub fn max_live(&self) -> usize {
            self.counters.max_live.load(Ordering::SeqCst)
        }
    }

    pub struct MockTransport {
        incoming: mpsc::UnboundedReceiver<String>,
        outgoing: mpsc::UnboundedSender<String>,
        counters: Arc<Counters>,
        closed: bool,
    }

    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&self, url: &str) -> Result<MockTransport> {
            self.counters.urls.lock().unwrap().push(url.to_string());
            let plan = self.plans.lock().unwrap().pop_front();
            match plan {
                Some(Plan::Accept(t)) => {
                    self.counters.opened.fetch_add(1, Ordering::SeqCst);
                    let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
                    self.counters.max_live.fetch_max(live, Ordering::SeqCst);
                    Ok(t)
                }
                Some(Plan::Refuse) | None => Err(anyhow!("connection refused")),
            }
        }
    }

    impl Transport for MockTransport {
        async fn send_text(&mut self, text: String) -> Result<()> {
            self.outgoing
                .send(text)
                .map_err(|_| anyhow!("peer gone"))
        }

        async fn recv_text(&mut self) -> Result<Option<String>> {
            Ok(self.incoming.recv().await)
        }

        async fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
                self.counters.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::{ConversationId, Role, Session};
    use tokio::time::timeout;

    fn session(id: u64, token: &str) -> StoredSession {
        StoredSession::new(
            token.to_string(),
            Session {
                id: UserId(id),
                name: format!("user{}", id),
                role: Role::Customer,
            },
        )
    }

    fn fast_policy(attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts,
            delay: Duration::from_millis(5),
        }
    }

    async fn next_kind(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for connection event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_handshake_and_event_delivery() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.accept_handshake();
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(0));

        let id = manager
            .set_session(Some(&session(1, "tok")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(peer.next_sent().await.as_deref(), Some("40"));
        let ev = next_kind(&mut rx).await;
        assert_eq!(ev.connection, id);
        assert_eq!(ev.kind, LinkEvent::Connected);

        peer.push("2");
        assert_eq!(peer.from_client.recv().await.as_deref(), Some("3"));

        peer.push(r#"42["new_message",{"conversation_id":7,"sender_id":2,"content":"hey"}]"#);
        match next_kind(&mut rx).await.kind {
            LinkEvent::Message(ServerEvent::NewMessage(m)) => {
                assert_eq!(m.conversation_id, ConversationId(7));
            }
            other => panic!("unexpected {:?}", other),
        }

        let urls = connector.counters.urls.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec!["wss://api.test/socket.io/?EIO=4&transport=websocket&token=tok"]
        );

        manager.disconnect().await;
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_emit_reaches_socket() {
        let connector = Arc::new(MockConnector::default());
        let mut peer = connector.accept_handshake();
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "http://api.test", fast_policy(0));
        manager.set_session(Some(&session(1, "tok"))).await.unwrap();
        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);
        assert_eq!(peer.next_sent().await.as_deref(), Some("40"));

        let emitter = manager.emitter().unwrap();
        assert!(emitter.emit(ClientEvent::RequestStatus { user_id: UserId(3) }));
        assert_eq!(
            peer.next_sent().await.as_deref(),
            Some(r#"42["request_status",{"user_id":3}]"#)
        );
    }

    #[tokio::test]
    async fn test_single_connection_across_session_changes() {
        let connector = Arc::new(MockConnector::default());
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(0));

        let _p1 = connector.accept_handshake();
        let first = manager.set_session(Some(&session(1, "a"))).await.unwrap();
        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);

        // Same session again: nothing new is opened.
        let again = manager.set_session(Some(&session(1, "a"))).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(connector.opened(), 1);

        // Logout.
        assert_eq!(manager.set_session(None).await.unwrap(), None);
        assert_eq!(connector.closed(), 1);
        assert!(manager.emitter().is_none());

        // Login as someone else, then switch users without logging out.
        let _p2 = connector.accept_handshake();
        let second = manager.set_session(Some(&session(2, "b"))).await.unwrap();
        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);
        assert_ne!(first, second);

        let _p3 = connector.accept_handshake();
        let third = manager.set_session(Some(&session(3, "c"))).await.unwrap();
        let ev = next_kind(&mut rx).await;
        assert_eq!(Some(ev.connection), third);

        assert_eq!(connector.opened(), 3);
        assert_eq!(connector.closed(), 2);
        assert_eq!(connector.max_live(), 1);

        manager.disconnect().await;
        assert_eq!(connector.closed(), 3);
    }

    #[tokio::test]
    async fn test_bounded_retry_then_failed() {
        let connector = Arc::new(MockConnector::default());
        for _ in 0..3 {
            connector.refuse();
        }
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(2));
        manager.set_session(Some(&session(1, "tok"))).await.unwrap();

        let mut disconnects = 0;
        loop {
            match next_kind(&mut rx).await.kind {
                LinkEvent::Disconnected { .. } => disconnects += 1,
                LinkEvent::Failed { .. } => break,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(disconnects, 2);
        assert_eq!(connector.counters.urls.lock().unwrap().len(), 3);
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_reconnects_after_drop() {
        let connector = Arc::new(MockConnector::default());
        let peer = connector.accept_handshake();
        let _second = connector.accept_handshake();
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(1));
        let id = manager.set_session(Some(&session(1, "tok"))).await.unwrap();

        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);
        drop(peer);
        assert!(matches!(
            next_kind(&mut rx).await.kind,
            LinkEvent::Disconnected { .. }
        ));
        let ev = next_kind(&mut rx).await;
        assert_eq!(ev.kind, LinkEvent::Connected);
        // Same connection identity across a reconnect.
        assert_eq!(Some(ev.connection), id);
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_connect_error_counts_as_failed_attempt() {
        let connector = Arc::new(MockConnector::default());
        let peer = connector.accept();
        peer.push(OPEN);
        peer.push(r#"44{"message":"invalid token"}"#);
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(0));
        manager.set_session(Some(&session(1, "bad"))).await.unwrap();

        match next_kind(&mut rx).await.kind {
            LinkEvent::Failed { reason } => assert!(reason.contains("invalid token"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_server_namespace_disconnect_is_not_retried() {
        let connector = Arc::new(MockConnector::default());
        let peer = connector.accept_handshake();
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(3));
        manager.set_session(Some(&session(1, "tok"))).await.unwrap();
        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);

        peer.push("41");
        assert!(matches!(
            next_kind(&mut rx).await.kind,
            LinkEvent::Failed { .. }
        ));
        assert_eq!(connector.counters.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_namespaces_are_ignored() {
        let connector = Arc::new(MockConnector::default());
        let peer = connector.accept_handshake();
        let (mut manager, mut rx) =
            ConnectionManager::new(Arc::clone(&connector), "https://api.test", fast_policy(3));
        manager.set_session(Some(&session(1, "tok"))).await.unwrap();
        assert_eq!(next_kind(&mut rx).await.kind, LinkEvent::Connected);

        peer.push("41/admin,");
        peer.push(r#"42/admin,["new_message",{"conversation_id":9,"sender_id":2,"content":"x"}]"#);
        peer.push(r#"42["new_message",{"conversation_id":7,"sender_id":2,"content":"hey"}]"#);
        match next_kind(&mut rx).await.kind {
            LinkEvent::Message(ServerEvent::NewMessage(m)) => {
                assert_eq!(m.conversation_id, ConversationId(7));
            }
            other => panic!("unexpected {:?}", other),
        }

        manager.disconnect().await;
        assert_eq!(connector.closed(), 1);
    }
}

//! Async backend: runs REST requests off the state machine's task.
//!
//! Uses an mpsc channel pair. The owner sends `Request` values, and a
//! background tokio task executes them and sends `Response` values back.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::state::{Request, Response};
use crate::api::ChatApi;

/// Handle for interacting with the backend.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<Request>,
    resp_rx: mpsc::UnboundedReceiver<Response>,
}

impl Backend {
    /// Start the backend. Spawns a tokio task that processes requests.
    pub fn start<A: ChatApi>(api: Arc<A>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(api, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a request to the backend (non-blocking).
    pub fn send(&self, request: Request) {
        if self.cmd_tx.send(request).is_err() {
            tracing::error!("Backend channel closed -- request dropped");
        }
    }

    /// Receive a response from the backend.
    ///
    /// Suspends until a response is available. Returns `None` only when the
    /// backend channel is permanently closed.
    /// Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<Response> {
        self.resp_rx.recv().await
    }
}

/// Background loop. Each request runs as its own task, so responses can
/// arrive in any order; the state machine's guards sort that out.
async fn backend_loop<A: ChatApi>(
    api: Arc<A>,
    mut cmd_rx: mpsc::UnboundedReceiver<Request>,
    resp_tx: mpsc::UnboundedSender<Response>,
) {
    while let Some(request) = cmd_rx.recv().await {
        let api = Arc::clone(&api);
        let resp_tx = resp_tx.clone();

        tokio::spawn(async move {
            let _ = resp_tx.send(execute(api.as_ref(), request).await);
        });
    }
}

async fn execute<A: ChatApi>(api: &A, request: Request) -> Response {
    match request {
        Request::LoadConversations { user } => Response::Conversations {
            user,
            result: api.conversations(user).await,
        },
        Request::LoadMessages { conversation } => Response::Messages {
            conversation,
            result: api.messages(conversation).await,
        },
        Request::CreateConversation { user, body, then } => Response::ConversationCreated {
            user,
            then,
            result: api.create_conversation(body).await,
        },
        Request::LoadNotifications { user } => Response::Notifications {
            user,
            result: api.notifications(user).await,
        },
        Request::MarkNotificationRead { id } => Response::NotificationMarked {
            id,
            result: api.mark_notification_read(id).await,
        },
        Request::MarkAllNotificationsRead { user } => Response::AllNotificationsMarked {
            result: api.mark_all_notifications_read(user).await,
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory `ChatApi`.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::{anyhow, Result};

    use crate::api::ChatApi;
    use crate::models::{
        ConversationId, ConversationRecord, Message, NewConversation, Notification,
        NotificationId, UserId,
    };

    #[derive(Default)]
    pub struct FakeApi {
        pub conversations: Mutex<Vec<ConversationRecord>>,
        pub messages: Mutex<HashMap<ConversationId, Vec<Message>>>,
        /// Artificial latency per conversation's history fetch.
        pub message_delay: Mutex<HashMap<ConversationId, Duration>>,
        pub notifications: Mutex<Vec<Notification>>,
        pub created: Mutex<Vec<NewConversation>>,
        pub marked: Mutex<Vec<NotificationId>>,
        pub next_conversation: Mutex<u64>,
        pub fail_marks: bool,
        pub fail_conversations: bool,
    }

    impl ChatApi for FakeApi {
        async fn conversations(&self, _user: UserId) -> Result<Vec<ConversationRecord>> {
            if self.fail_conversations {
                return Err(anyhow!("HTTP 503"));
            }
            Ok(self.conversations.lock().unwrap().clone())
        }

        async fn messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
            let delay = self.message_delay.lock().unwrap().get(&conversation).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(&conversation)
                .cloned()
                .unwrap_or_default())
        }

        async fn create_conversation(&self, body: NewConversation) -> Result<ConversationId> {
            self.created.lock().unwrap().push(body);
            let mut next = self.next_conversation.lock().unwrap();
            *next += 1;
            Ok(ConversationId(*next))
        }

        async fn notifications(&self, _user: UserId) -> Result<Vec<Notification>> {
            Ok(self.notifications.lock().unwrap().clone())
        }

        async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
            self.marked.lock().unwrap().push(id);
            if self.fail_marks {
                return Err(anyhow!("HTTP 500"));
            }
            Ok(())
        }

        async fn mark_all_notifications_read(&self, _user: UserId) -> Result<()> {
            if self.fail_marks {
                return Err(anyhow!("HTTP 500"));
            }
            Ok(())
        }
    }
}

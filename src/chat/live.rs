//! Commands that hold a realtime session open.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::timeout;

use super::runtime::{ChatRuntime, Update};
use super::state::{ChatState, LinkState};
use crate::api::ApiClient;
use crate::auth::StoredSession;
use crate::config::Config;
use crate::models::{ConversationId, UserId};
use crate::realtime::{Connector, LinkEvent, ReconnectPolicy, ServerEvent, WsConnector};

const ECHO_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime for `config`'s backend with no session attached yet.
pub fn runtime(config: &Config) -> Result<ChatRuntime> {
    let api = Arc::new(ApiClient::from_config(config)?);
    Ok(ChatRuntime::new(
        api,
        Arc::new(WsConnector),
        &config.api_base_url,
        ReconnectPolicy::from(&config.realtime),
    ))
}

/// Runtime logged in as the stored session and connecting.
async fn connect(config: &Config) -> Result<(ChatRuntime, StoredSession)> {
    let session = config.require_session()?.clone();
    let mut runtime = runtime(config)?;
    runtime.set_session(Some(&session)).await?;
    Ok((runtime, session))
}

/// Drive the runtime until `done` holds. Fails if the link gives up.
async fn wait_for<C, F>(runtime: &mut ChatRuntime<C>, what: &str, mut done: F) -> Result<()>
where
    C: Connector,
    F: FnMut(&ChatState) -> bool,
{
    let waited = timeout(ECHO_TIMEOUT, async {
        while !done(runtime.state()) {
            if runtime.state().link() == LinkState::Failed {
                bail!("Realtime connection failed (see log)");
            }
            if runtime.next().await.is_none() {
                bail!("Chat runtime stopped");
            }
        }
        Ok(())
    })
    .await;

    match waited {
        Ok(result) => result,
        Err(_) => bail!("Timed out waiting for {}", what),
    }
}

/// Send a message and wait for the server's echo.
pub async fn send(id: ConversationId, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Refusing to send an empty message");
    }
    let config = Config::load()?;
    let (mut runtime, session) = connect(&config).await?;
    let me = session.user.id;

    wait_for(&mut runtime, "the connection", |s| s.link() == LinkState::Online).await?;
    wait_for(&mut runtime, "the conversation list", |s| {
        s.conversations.is_loaded()
    })
    .await?;

    runtime.apply(|s| s.open_conversation(id));
    if runtime.state().active().is_none() {
        runtime.shutdown().await;
        bail!("Unknown conversation {} (see 'venue-chat conversations')", id);
    }
    wait_for(&mut runtime, "the history", |s| !s.stream.is_loading()).await?;

    let before = runtime.state().stream.messages().len();
    runtime.apply(|s| s.send_message(text));
    let echoed = wait_for(&mut runtime, "the server echo", |s| {
        s.stream
            .messages()
            .iter()
            .skip(before)
            .any(|m| m.sender_id == me && m.content == text)
    })
    .await;

    runtime.shutdown().await;
    echoed.context("Message may not have been delivered")?;
    println!("Message delivered.");
    Ok(())
}

/// Ask for a user's online status.
pub async fn presence(user: UserId) -> Result<()> {
    let config = Config::load()?;
    let (mut runtime, _) = connect(&config).await?;

    wait_for(&mut runtime, "the connection", |s| s.link() == LinkState::Online).await?;

    // Status events carry no request id; the first report about `user` wins.
    runtime.apply(|s| s.watch_presence(user));
    let reported = if runtime.state().presence.status().is_online() {
        true
    } else {
        let answered = timeout(ECHO_TIMEOUT, async {
            while let Some(update) = runtime.next().await {
                if let Update::Link(LinkEvent::Message(ServerEvent::UserStatus(u))) = update {
                    if u.user_id == user {
                        return true;
                    }
                }
            }
            false
        })
        .await;
        matches!(answered, Ok(true))
    };
    let status = runtime.state().presence.status();

    runtime.shutdown().await;
    let suffix = if reported { "" } else { " (no report)" };
    println!(
        "User {}: {}{}",
        user,
        if status.is_online() { "online" } else { "offline" },
        suffix
    );
    Ok(())
}

/// Print realtime activity until interrupted.
pub async fn listen() -> Result<()> {
    let config = Config::load()?;
    let (mut runtime, session) = connect(&config).await?;
    println!(
        "Listening as {} (user {}). Press Ctrl+C to stop.",
        session.user.name, session.user.id
    );

    loop {
        let update = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = runtime.next() => match update {
                Some(u) => u,
                None => break,
            },
        };

        match update {
            Update::Link(LinkEvent::Connected) => println!("[connected]"),
            Update::Link(LinkEvent::Disconnected { reason }) => {
                println!("[disconnected: {}; retrying]", reason)
            }
            Update::Link(LinkEvent::Failed { reason }) => {
                println!("[connection failed: {}]", reason);
                break;
            }
            Update::Link(LinkEvent::Message(event)) => match event {
                ServerEvent::NewMessage(m) => {
                    println!("[conversation {}] #{}: {}", m.conversation_id, m.sender_id, m.content)
                }
                ServerEvent::UserStatus(u) => {
                    let status = if u.status.is_online() { "online" } else { "offline" };
                    println!("[status] user {} is {}", u.user_id, status)
                }
                ServerEvent::NewNotification(n) => {
                    println!("[notification {}] {}: {}", n.id, n.title, n.message)
                }
                ServerEvent::Other(name) => tracing::debug!("Event {}", name),
            },
            Update::Fetched(_) => {
                tracing::debug!(
                    "{} unread messages, {} unread notifications",
                    runtime.state().total_unread(),
                    runtime.state().unread_notifications()
                );
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::backend::testing::FakeApi;
    use crate::models::{Role, Session};
    use crate::realtime::testing::MockConnector;

    #[tokio::test(start_paused = true)]
    async fn test_wait_names_the_missing_condition() {
        let api = Arc::new(FakeApi {
            fail_conversations: true,
            ..FakeApi::default()
        });
        let connector = Arc::new(MockConnector::default());
        let _peer = connector.accept_handshake();
        let mut runtime = ChatRuntime::new(
            api,
            Arc::clone(&connector),
            "https://api.test",
            ReconnectPolicy {
                attempts: 0,
                delay: Duration::from_millis(5),
            },
        );
        let session = StoredSession::new(
            "tok".to_string(),
            Session {
                id: UserId(10),
                name: "Me".to_string(),
                role: Role::Customer,
            },
        );
        runtime.set_session(Some(&session)).await.unwrap();

        wait_for(&mut runtime, "the connection", |s| s.link() == LinkState::Online)
            .await
            .unwrap();
        let err = wait_for(&mut runtime, "the conversation list", |s| {
            s.conversations.is_loaded()
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Timed out waiting for the conversation list");

        runtime.shutdown().await;
    }
}

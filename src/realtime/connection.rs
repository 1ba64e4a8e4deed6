//! Per-connection task: handshake, heartbeat, event pump, bounded retry.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use super::events::{ClientEvent, ServerEvent};
use super::frame::{self, OpenInfo, Packet, SocketPacket};
use super::websocket::{Connector, Transport};
use super::{ConnectionEvent, ConnectionId, LinkEvent, ReconnectPolicy};

/// How a single connection attempt ended.
enum Attempt {
    /// Shutdown requested. Do not reconnect.
    Shutdown,
    /// Never got past the handshake.
    Refused(anyhow::Error),
    /// Was connected, then lost the link.
    Dropped(anyhow::Error),
    /// Server closed our namespace. Reconnecting would be refused again.
    Kicked,
}

pub(super) struct Task<C: Connector> {
    pub connector: std::sync::Arc<C>,
    pub url: String,
    pub id: ConnectionId,
    pub policy: ReconnectPolicy,
    pub outgoing: mpsc::UnboundedReceiver<ClientEvent>,
    pub shutdown: oneshot::Receiver<()>,
    pub events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<C: Connector> Task<C> {
    fn report(&self, kind: LinkEvent) {
        // The consumer going away is not our problem; the manager ends us.
        let _ = self.events.send(ConnectionEvent {
            connection: self.id,
            kind,
        });
    }

    /// Run attempts until shutdown or the retry budget is spent.
    pub async fn run(mut self) {
        let mut retries = 0u32;

        loop {
            let reason = match self.attempt().await {
                Attempt::Shutdown => {
                    tracing::info!("Connection {} closed", self.id);
                    return;
                }
                Attempt::Kicked => {
                    tracing::warn!("Connection {} closed by server", self.id);
                    self.report(LinkEvent::Failed {
                        reason: "closed by server".to_string(),
                    });
                    return;
                }
                Attempt::Dropped(e) => {
                    // A successful handshake restores the full budget.
                    retries = 0;
                    e
                }
                Attempt::Refused(e) => e,
            };

            if retries >= self.policy.attempts {
                tracing::warn!(
                    "Connection {} giving up after {} retries: {:#}",
                    self.id,
                    retries,
                    reason
                );
                self.report(LinkEvent::Failed {
                    reason: format!("{:#}", reason),
                });
                return;
            }
            retries += 1;

            tracing::warn!(
                "Connection {} lost: {:#}. Retry {}/{} in {:?}",
                self.id,
                reason,
                retries,
                self.policy.attempts,
                self.policy.delay
            );
            self.report(LinkEvent::Disconnected {
                reason: format!("{:#}", reason),
            });

            tokio::select! {
                _ = time::sleep(self.policy.delay) => {}
                _ = &mut self.shutdown => {
                    tracing::info!("Connection {} closed while waiting to retry", self.id);
                    return;
                }
            }
        }
    }

    async fn attempt(&mut self) -> Attempt {
        let connector = std::sync::Arc::clone(&self.connector);
        let mut transport = tokio::select! {
            _ = &mut self.shutdown => return Attempt::Shutdown,
            res = connector.connect(&self.url) => match res {
                Ok(t) => t,
                Err(e) => return Attempt::Refused(e),
            },
        };

        let open = tokio::select! {
            _ = &mut self.shutdown => {
                transport.close().await;
                return Attempt::Shutdown;
            }
            res = handshake(&mut transport) => match res {
                Ok(open) => open,
                Err(e) => {
                    transport.close().await;
                    return Attempt::Refused(e);
                }
            },
        };

        tracing::info!("Connection {} established (sid={})", self.id, open.sid);
        self.report(LinkEvent::Connected);

        let window = open.liveness_window();
        let mut deadline = Instant::now() + window;

        let outcome = loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    // Best-effort namespace leave before closing.
                    let _ = transport.send_text(frame::DISCONNECT.to_string()).await;
                    break Attempt::Shutdown;
                }
                _ = time::sleep_until(deadline) => {
                    break Attempt::Dropped(anyhow!("No ping from server within {:?}", window));
                }
                next = transport.recv_text() => {
                    let text = match next {
                        Ok(Some(text)) => text,
                        Ok(None) => break Attempt::Dropped(anyhow!("Socket closed by server")),
                        Err(e) => break Attempt::Dropped(e),
                    };
                    deadline = Instant::now() + window;
                    match handle_frame(&text, &mut transport, self.id, &self.events).await {
                        Ok(true) => {}
                        Ok(false) => break Attempt::Kicked,
                        Err(e) => break Attempt::Dropped(e),
                    }
                }
                Some(event) = self.outgoing.recv() => {
                    match event.to_frame() {
                        Ok(text) => {
                            if let Err(e) = transport.send_text(text).await {
                                break Attempt::Dropped(e.context(format!("Emit {} failed", event.name())));
                            }
                        }
                        Err(e) => tracing::warn!("Dropping {} emit: {:#}", event.name(), e),
                    }
                }
            }
        };

        transport.close().await;
        outcome
    }
}

/// Handle one frame. Returns `Ok(false)` when the server ended the session.
async fn handle_frame<T: Transport>(
    text: &str,
    transport: &mut T,
    id: ConnectionId,
    events: &mpsc::UnboundedSender<ConnectionEvent>,
) -> Result<bool> {
    let packet = match frame::decode(text) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Ignoring undecodable frame {:?}: {:#}", text, e);
            return Ok(true);
        }
    };

    match packet {
        Packet::Ping => {
            transport
                .send_text(frame::PONG.to_string())
                .await
                .context("Heartbeat reply failed")?;
        }
        Packet::Close => bail!("Server closed the transport"),
        Packet::Message(SocketPacket::Disconnect) => return Ok(false),
        Packet::Namespaced { namespace, .. } => {
            tracing::debug!("Ignoring packet for namespace {}", namespace);
        }
        Packet::Message(SocketPacket::Event { name, data }) => {
            match ServerEvent::parse(&name, data) {
                Ok(event) => {
                    let _ = events.send(ConnectionEvent {
                        connection: id,
                        kind: LinkEvent::Message(event),
                    });
                }
                Err(e) => tracing::warn!("Dropping {} event: {:#}", name, e),
            }
        }
        other => tracing::debug!("Ignoring packet {:?}", other),
    }
    Ok(true)
}

/// Engine.IO open, then Socket.IO namespace connect.
async fn handshake<T: Transport>(transport: &mut T) -> Result<OpenInfo> {
    let open = match next_packet(transport).await? {
        Packet::Open(info) => info,
        other => bail!("Expected open packet, got {:?}", other),
    };

    transport
        .send_text(frame::CONNECT.to_string())
        .await
        .context("Namespace connect failed")?;

    loop {
        match next_packet(transport).await? {
            Packet::Message(SocketPacket::Connect(_)) => return Ok(open),
            Packet::Message(SocketPacket::ConnectError(data)) => {
                let message = data
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("connection refused");
                bail!("Server rejected connection: {}", message);
            }
            Packet::Ping => {
                transport.send_text(frame::PONG.to_string()).await?;
            }
            Packet::Noop | Packet::Namespaced { .. } => {}
            other => bail!("Unexpected packet during handshake: {:?}", other),
        }
    }
}

async fn next_packet<T: Transport>(transport: &mut T) -> Result<Packet> {
    let text = time::timeout(HANDSHAKE_TIMEOUT, transport.recv_text())
        .await
        .context("Handshake timed out")??
        .context("Socket closed during handshake")?;
    frame::decode(&text)
}

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

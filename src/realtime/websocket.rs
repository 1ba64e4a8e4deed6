//! WebSocket transport for the realtime channel

use std::future::Future;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A text-frame duplex channel.
pub trait Transport: Send + 'static {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Next text frame, `None` once the peer has closed.
    fn recv_text(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports. One call per connection attempt.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Build the socket.io WebSocket URL for an API base URL.
///
/// The session token travels as the `token` query parameter.
pub fn socket_url(api_base: &str, token: &str) -> Result<String> {
    let mut url = url::Url::parse(api_base)
        .with_context(|| format!("Invalid API base URL: {}", api_base))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => anyhow::bail!("Unsupported URL scheme for realtime channel: {}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("Cannot switch {} to {}", api_base, scheme))?;
    url.set_path("/socket.io/");
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair("token", token);

    Ok(url.to_string())
}

/// tokio-tungstenite connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

pub struct WsTransport {
    stream: WsStream,
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport> {
        tracing::info!("Connecting WebSocket to {}", redact_token(url));

        let (stream, response) = connect_async(url)
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(WsTransport { stream })
    }
}

impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        tracing::debug!("WS send: {}", text);
        self.stream
            .send(Message::Text(text))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Receive the next text frame, answering pings and skipping binary.
    async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close: {}", e);
        }
    }
}

/// Strip the token from a URL before logging it.
fn redact_token(url: &str) -> String {
    match url.find("token=") {
        Some(pos) => {
            let tail = &url[pos + "token=".len()..];
            let end = tail.find('&').unwrap_or(tail.len());
            format!("{}token=***{}", &url[..pos], &tail[end..])
        }
        None => url.to_string(),
    }
}

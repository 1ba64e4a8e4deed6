//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Engine.IO packet = one type digit + payload:
//!   0 open, 1 close, 2 ping, 3 pong, 4 message, 5 upgrade, 6 noop.
//! A `4` message carries a Socket.IO packet:
//!   0 connect, 1 disconnect, 2 event, 3 ack, 4 connect_error,
//! optionally followed by `/namespace,` and an ack id before the JSON body.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters from the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Silence after which the server is considered gone.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// A decoded Engine.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    /// Socket.IO packet on the default namespace.
    Message(SocketPacket),
    /// Socket.IO packet addressed to another namespace. We never join one.
    Namespaced {
        namespace: String,
        packet: SocketPacket,
    },
    Noop,
}

/// A decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    Ack,
    ConnectError(Value),
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let kind = chars.next().context("Empty frame")?;
    let body = chars.as_str();

    match kind {
        '0' => {
            let info: OpenInfo =
                serde_json::from_str(body).context("Malformed Engine.IO open packet")?;
            Ok(Packet::Open(info))
        }
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(body),
        '5' | '6' => Ok(Packet::Noop),
        other => bail!("Unknown Engine.IO packet type {:?}", other),
    }
}

fn decode_message(body: &str) -> Result<Packet> {
    let mut chars = body.chars();
    let kind = chars.next().context("Empty Socket.IO packet")?;
    let mut rest = chars.as_str();

    // Namespace: "/chat,..." ("/" alone is the default one)
    let mut namespace = "/";
    if rest.starts_with('/') {
        (namespace, rest) = match rest.find(',') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };
    }

    let packet = decode_socket(kind, rest)?;
    if namespace == "/" {
        Ok(Packet::Message(packet))
    } else {
        Ok(Packet::Namespaced {
            namespace: namespace.to_string(),
            packet,
        })
    }
}

fn decode_socket(kind: char, rest: &str) -> Result<SocketPacket> {
    // Ack id digits precede the JSON body.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let json = |s: &str| -> Result<Option<Value>> {
        if s.is_empty() {
            Ok(None)
        } else {
            serde_json::from_str(s)
                .map(Some)
                .context("Malformed Socket.IO payload")
        }
    };

    match kind {
        '0' => Ok(SocketPacket::Connect(json(rest)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let args = match json(rest)? {
                Some(Value::Array(args)) => args,
                _ => bail!("Socket.IO event without argument array"),
            };
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => bail!("Socket.IO event without a name"),
            };
            let data = args.next().unwrap_or(Value::Null);
            Ok(SocketPacket::Event { name, data })
        }
        '3' => Ok(SocketPacket::Ack),
        '4' => Ok(SocketPacket::ConnectError(json(rest)?.unwrap_or(Value::Null))),
        other => bail!("Unsupported Socket.IO packet type {:?}", other),
    }
}

/// Client pong reply to a server ping.
pub const PONG: &str = "3";

/// Connect to the default namespace.
pub const CONNECT: &str = "40";

/// Leave the default namespace.
pub const DISCONNECT: &str = "41";

/// Encode an event emit: `42["name",data]`. Field order of `data` is kept.
pub fn encode_event<T: Serialize + ?Sized>(name: &str, data: &T) -> Result<String> {
    let args = serde_json::to_string(&(name, data)).context("Failed to serialize event")?;
    Ok(format!("42{}", args))
}

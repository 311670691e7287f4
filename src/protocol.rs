//! Engine.IO v4 / Socket.IO v5 text frame codec.
//!
//! The game server is a Socket.IO server. On a WebSocket transport every
//! text message is one Engine.IO packet: a single type digit followed by an
//! optional payload. Engine.IO `MESSAGE` packets (`4`) carry a Socket.IO
//! packet, whose layout is
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<json>]
//! ```
//!
//! so a server event reads `42["timer_update",{"time":9}]`. Only the text
//! packet types are supported; binary attachments are rejected as
//! [`PartyClientError::Protocol`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PartyClientError, Result};

/// Engine.IO protocol revision spoken by this client.
pub const ENGINE_IO_VERSION: u8 = 4;

// ── Handshake ───────────────────────────────────────────────────────

/// Payload of the Engine.IO `OPEN` packet sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    /// Engine.IO session id.
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

// ── Packets ─────────────────────────────────────────────────────────

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0`: handshake.
    Open(OpenPayload),
    /// `1`: transport close.
    Close,
    /// `2`: heartbeat from the server.
    Ping,
    /// `3`: heartbeat reply.
    Pong,
    /// `4`: Socket.IO payload.
    Message(SocketPacket),
    /// `5`: transport upgrade (unused on WebSocket).
    Upgrade,
    /// `6`: no-op.
    Noop,
}

/// A Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0`: namespace connect (client) or connect ack (server).
    Connect(Option<Value>),
    /// `1`: namespace disconnect.
    Disconnect,
    /// `2`: a named event with an optional payload.
    Event {
        name: String,
        data: Option<Value>,
        ack_id: Option<u64>,
    },
    /// `3`: acknowledgement for an event sent with an ack id.
    Ack { ack_id: u64, data: Vec<Value> },
    /// `4`: namespace connection refused.
    ConnectError(Option<Value>),
}

impl EnginePacket {
    /// The Socket.IO namespace connect request (`40`).
    pub fn connect() -> Self {
        Self::Message(SocketPacket::Connect(None))
    }

    /// A Socket.IO event carrying `data`, without an ack id.
    pub fn event(name: impl Into<String>, data: Option<Value>) -> Self {
        Self::Message(SocketPacket::Event {
            name: name.into(),
            data,
            ack_id: None,
        })
    }

    /// Encode to a single text frame.
    ///
    /// # Errors
    ///
    /// Returns [`PartyClientError::Serialization`] if a JSON payload fails
    /// to serialize.
    pub fn encode(&self) -> Result<String> {
        let frame = match self {
            Self::Open(payload) => format!("0{}", serde_json::to_string(payload)?),
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Message(packet) => format!("4{}", packet.encode()?),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        };
        Ok(frame)
    }
}

impl SocketPacket {
    fn encode(&self) -> Result<String> {
        let encoded = match self {
            Self::Connect(None) => "0".to_string(),
            Self::Connect(Some(auth)) => format!("0{}", serde_json::to_string(auth)?),
            Self::Disconnect => "1".to_string(),
            Self::Event { name, data, ack_id } => {
                let mut args = vec![Value::String(name.clone())];
                if let Some(data) = data {
                    args.push(data.clone());
                }
                let ack = ack_id.map(|id| id.to_string()).unwrap_or_default();
                format!("2{ack}{}", serde_json::to_string(&args)?)
            }
            Self::Ack { ack_id, data } => format!("3{ack_id}{}", serde_json::to_string(data)?),
            Self::ConnectError(None) => "4".to_string(),
            Self::ConnectError(Some(detail)) => format!("4{}", serde_json::to_string(detail)?),
        };
        Ok(encoded)
    }
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode one text frame.
///
/// # Errors
///
/// Returns [`PartyClientError::Protocol`] for empty frames, unknown packet
/// types, binary packets and event arrays without a string name, and
/// [`PartyClientError::Serialization`] for invalid JSON payloads.
pub fn decode(frame: &str) -> Result<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PartyClientError::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => Ok(EnginePacket::Message(decode_socket_packet(rest)?)),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PartyClientError::Protocol(format!(
            "unknown engine packet type {other:?}"
        ))),
    }
}

fn decode_socket_packet(body: &str) -> Result<SocketPacket> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| PartyClientError::Protocol("empty socket packet".into()))?;
    let rest = strip_namespace(chars.as_str());
    let (ack_id, json) = split_ack_id(rest)?;

    match kind {
        '0' => Ok(SocketPacket::Connect(optional_json(json)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let args: Vec<Value> = serde_json::from_str(json)?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => {
                    return Err(PartyClientError::Protocol(
                        "event without a string name".into(),
                    ))
                }
            };
            Ok(SocketPacket::Event {
                name,
                data: args.next(),
                ack_id,
            })
        }
        '3' => {
            let ack_id = ack_id
                .ok_or_else(|| PartyClientError::Protocol("ack without an id".into()))?;
            Ok(SocketPacket::Ack {
                ack_id,
                data: serde_json::from_str(json)?,
            })
        }
        '4' => Ok(SocketPacket::ConnectError(optional_json(json)?)),
        '5' | '6' => Err(PartyClientError::Protocol(
            "binary socket packets are not supported".into(),
        )),
        other => Err(PartyClientError::Protocol(format!(
            "unknown socket packet type {other:?}"
        ))),
    }
}

/// Drop a leading `/namespace,` prefix; the game only uses `/`.
fn strip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.split_once(',') {
            Some((_, tail)) => tail,
            None => "",
        }
    } else {
        rest
    }
}

fn split_ack_id(rest: &str) -> Result<(Option<u64>, &str)> {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, rest));
    }
    let (id, json) = rest
        .split_at_checked(digits)
        .ok_or_else(|| PartyClientError::Protocol("bad ack id".into()))?;
    let id = id
        .parse()
        .map_err(|_| PartyClientError::Protocol(format!("ack id out of range: {id}")))?;
    Ok((Some(id), json))
}

fn optional_json(json: &str) -> Result<Option<Value>> {
    if json.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(json)?))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let EnginePacket::Open(open) = packet else {
            panic!("expected Open");
        };
        assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(open.ping_interval, 25_000);
        assert_eq!(open.ping_timeout, 20_000);
        assert_eq!(open.max_payload, Some(1_000_000));
    }

    #[test]
    fn decodes_heartbeats_and_control_packets() {
        assert_eq!(decode("2").unwrap(), EnginePacket::Ping);
        assert_eq!(decode("3").unwrap(), EnginePacket::Pong);
        assert_eq!(decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(decode("6").unwrap(), EnginePacket::Noop);
        assert_eq!(
            decode("41").unwrap(),
            EnginePacket::Message(SocketPacket::Disconnect)
        );
    }

    #[test]
    fn decodes_connect_ack_with_sid() {
        let packet = decode(r#"40{"sid":"wZX3oN0bSVIhsaknAAAI"}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Connect(Some(
                json!({"sid": "wZX3oN0bSVIhsaknAAAI"})
            )))
        );
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode(r#"42["game_timer_update",{"time":7,"round_number":2}]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                name: "game_timer_update".into(),
                data: Some(json!({"time": 7, "round_number": 2})),
                ack_id: None,
            })
        );
    }

    #[test]
    fn decodes_event_without_payload_and_with_ack_id() {
        let packet = decode(r#"4212["request_lobby"]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                name: "request_lobby".into(),
                data: None,
                ack_id: Some(12),
            })
        );
    }

    #[test]
    fn strips_namespace_prefix() {
        let packet = decode(r#"42/admin,["lobby_update",{"count":0}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event { name, .. }) = packet else {
            panic!("expected event");
        };
        assert_eq!(name, "lobby_update");
    }

    #[test]
    fn decodes_connect_error() {
        let packet = decode(r#"44{"message":"Not authorized"}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::ConnectError(Some(
                json!({"message": "Not authorized"})
            )))
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(decode(""), Err(PartyClientError::Protocol(_))));
        assert!(matches!(decode("9"), Err(PartyClientError::Protocol(_))));
        assert!(matches!(decode("4"), Err(PartyClientError::Protocol(_))));
        assert!(matches!(
            decode(r#"42[7,{"time":1}]"#),
            Err(PartyClientError::Protocol(_))
        ));
        assert!(matches!(
            decode(r#"451-["x",{"_placeholder":true,"num":0}]"#),
            Err(PartyClientError::Protocol(_))
        ));
        assert!(matches!(
            decode("42[not json"),
            Err(PartyClientError::Serialization(_))
        ));
    }

    #[test]
    fn encodes_client_frames() {
        assert_eq!(EnginePacket::connect().encode().unwrap(), "40");
        assert_eq!(EnginePacket::Pong.encode().unwrap(), "3");
        assert_eq!(
            EnginePacket::Message(SocketPacket::Disconnect)
                .encode()
                .unwrap(),
            "41"
        );
        assert_eq!(
            EnginePacket::event("join_lobby", Some(json!({"user_id": "u1", "lobby_id": "main"})))
                .encode()
                .unwrap(),
            r#"42["join_lobby",{"lobby_id":"main","user_id":"u1"}]"#
        );
        assert_eq!(
            EnginePacket::event("request_timer", None).encode().unwrap(),
            r#"42["request_timer"]"#
        );
    }

    #[test]
    fn encoded_event_decodes_to_same_packet() {
        let packet = EnginePacket::Message(SocketPacket::Event {
            name: "start_game".into(),
            data: Some(json!({"lobby_id": "main"})),
            ack_id: Some(3),
        });
        let frame = packet.encode().unwrap();
        assert_eq!(frame, r#"423["start_game",{"lobby_id":"main"}]"#);
        assert_eq!(decode(&frame).unwrap(), packet);
    }
}

//! Engine.IO v4 and Socket.IO v5 text packet codec.
//!
//! Over the WebSocket transport every frame carries exactly one Engine.IO
//! packet: a single type digit followed by an optional payload. Engine.IO
//! `message` packets wrap Socket.IO packets, laid out as
//! `<type>[/<namespace>,][<ack id>][<json>]`.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AdapterError;

/// Handshake data sent by the server in the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn parse(frame: &str) -> Result<Self, AdapterError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| AdapterError::ProtocolError("empty engine packet".to_string()))?;
        let body = chars.as_str();

        match kind {
            '0' => serde_json::from_str(body)
                .map(EnginePacket::Open)
                .map_err(|err| AdapterError::ProtocolError(format!("bad open packet: {}", err))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(AdapterError::ProtocolError(format!(
                "unknown engine packet type {:?}",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Clients never send `open`; the sid is enough to identify it in logs.
            EnginePacket::Open(open) => format!("0{{\"sid\":\"{}\"}}", open.sid),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl SocketPacketKind {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => SocketPacketKind::Connect,
            '1' => SocketPacketKind::Disconnect,
            '2' => SocketPacketKind::Event,
            '3' => SocketPacketKind::Ack,
            '4' => SocketPacketKind::ConnectError,
            '5' => SocketPacketKind::BinaryEvent,
            '6' => SocketPacketKind::BinaryAck,
            _ => return None,
        })
    }

    fn digit(&self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
            SocketPacketKind::BinaryEvent => '5',
            SocketPacketKind::BinaryAck => '6',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            ..Self::connect(namespace)
        }
    }

    pub fn parse(body: &str) -> Result<Self, AdapterError> {
        let mut chars = body.chars();
        let kind = chars
            .next()
            .and_then(SocketPacketKind::from_digit)
            .ok_or_else(|| {
                AdapterError::ProtocolError(format!("bad socket packet type in {:?}", body))
            })?;
        if matches!(
            kind,
            SocketPacketKind::BinaryEvent | SocketPacketKind::BinaryAck
        ) {
            return Err(AdapterError::ProtocolError(
                "binary packets are not supported".to_string(),
            ));
        }

        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    let namespace = &rest[..end];
                    rest = &rest[end + 1..];
                    namespace.to_string()
                }
                None => {
                    let namespace = rest.to_string();
                    rest = "";
                    namespace
                }
            }
        } else {
            "/".to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|err| AdapterError::ProtocolError(format!("bad ack id: {}", err)))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest).map_err(|err| {
                AdapterError::ProtocolError(format!("bad socket packet payload: {}", err))
            })?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Splits an `event` packet into its name and first argument.
    pub fn into_event(self) -> Option<(String, Value)> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }
        let Value::Array(mut items) = self.data? else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let name = match items.remove(0) {
            Value::String(name) => name,
            _ => return None,
        };
        let payload = if items.is_empty() {
            Value::Null
        } else {
            items.remove(0)
        };
        Some((name, payload))
    }

    /// Reason carried by a `connect_error` packet.
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("connection refused")
                .to_string(),
            Some(Value::String(message)) => message.clone(),
            _ => "connection refused".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_open_packet() {
        let packet = EnginePacket::parse(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(OpenPayload {
                sid: "lv_VI97HAXpY6yYWAAAC".to_string(),
                upgrades: vec![],
                ping_interval: 25000,
                ping_timeout: 20000,
                max_payload: Some(1_000_000),
            })
        );
    }

    #[test]
    fn ping_is_answered_with_matching_pong() {
        let EnginePacket::Ping(data) = EnginePacket::parse("2hello").unwrap() else {
            panic!("expected ping");
        };
        assert_eq!(EnginePacket::Pong(data).encode(), "3hello");
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn rejects_unknown_engine_type() {
        assert!(EnginePacket::parse("9").is_err());
        assert!(EnginePacket::parse("").is_err());
    }

    #[test]
    fn parses_event_on_default_namespace() {
        let packet =
            SocketPacket::parse(r#"2["processesStarted",{"name":"a","pid":1,"date":"d"}]"#)
                .unwrap();
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.ack_id, None);
        assert_eq!(
            packet.into_event(),
            Some((
                "processesStarted".to_string(),
                json!({"name": "a", "pid": 1, "date": "d"})
            ))
        );
    }

    #[test]
    fn parses_namespace_and_ack_id() {
        let packet = SocketPacket::parse(r#"2/admin,13["processesEnded",{}]"#).unwrap();
        assert_eq!(packet.namespace, "/admin");
        assert_eq!(packet.ack_id, Some(13));
        assert_eq!(
            packet.into_event(),
            Some(("processesEnded".to_string(), json!({})))
        );
    }

    #[test]
    fn event_without_arguments_has_null_payload() {
        let packet = SocketPacket::parse(r#"2["processesEnded"]"#).unwrap();
        assert_eq!(
            packet.into_event(),
            Some(("processesEnded".to_string(), Value::Null))
        );
    }

    #[test]
    fn connect_error_exposes_message() {
        let packet = SocketPacket::parse(r#"4{"message":"Not authorized"}"#).unwrap();
        assert_eq!(packet.kind, SocketPacketKind::ConnectError);
        assert_eq!(packet.error_message(), "Not authorized");
    }

    #[test]
    fn binary_packets_are_rejected() {
        assert!(SocketPacket::parse(r#"51-["x",{"_placeholder":true,"num":0}]"#).is_err());
    }

    #[test]
    fn encodes_connect_and_disconnect() {
        assert_eq!(SocketPacket::connect("/").encode(), "0");
        assert_eq!(SocketPacket::connect("/admin").encode(), "0/admin,");
        assert_eq!(SocketPacket::disconnect("/").encode(), "1");
        assert_eq!(
            EnginePacket::Message(SocketPacket::connect("/").encode()).encode(),
            "40"
        );
    }
}

//! Payloads exchanged between ring peers.
//!
//! Requests carry form-encoded bodies or query parameters, responses carry
//! JSON. The field names are part of the protocol and must not change, or
//! interop with existing peers breaks.

use crate::{NodeAddr, Result};
use serde_derive::{Deserialize, Serialize};

/// Query parameters of a join request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinQuery {
    pub ip: String,
    pub port: u16,
}

/// A granted join: the acceptor's previous successor pointer, which the
/// joining node adopts as its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinGranted {
    pub host: String,
    pub port: u16,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinDenied {
    pub message: String,
    pub success: bool,
}

/// Client-side view of a join response, tolerant of either outcome.
#[derive(Clone, Debug, Deserialize)]
pub struct JoinReply {
    #[serde(default)]
    pub success: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub message: Option<String>,
}

/// A quit announcement: the departing node and its successor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuitForm {
    pub host: String,
    pub port: u16,
    pub next_host: String,
    pub next_port: u16,
}

impl QuitForm {
    pub fn new(target: NodeAddr, target_next: NodeAddr) -> QuitForm {
        QuitForm {
            host: target.host.to_string(),
            port: target.port,
            next_host: target_next.host.to_string(),
            next_port: target_next.port,
        }
    }
}

/// An election or elected token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenForm {
    pub node_id: u64,
}

/// One hop of a chat message. `sender` is the originator's encoded id and
/// is preserved across every hop so receivers can attribute the line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatForm {
    pub message: String,
    pub sender: u64,
}

/// An orphan announcement: a node whose predecessor has gone silent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanicForm {
    pub host: String,
    pub port: u16,
}

/// One node's view of itself, as returned by `/serialize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub host: String,
    pub port: u16,
    pub next_host: String,
    pub next_port: u16,
    pub leader: Option<u64>,
    pub heartbeat: u64,
}

impl Snapshot {
    pub fn next_addr(&self) -> Result<NodeAddr> {
        NodeAddr::from_parts(&self.next_host, self.next_port)
    }
}

/// The whole ring as seen from one member, as returned by `/serialize/all`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingDump {
    pub nodes: Vec<Snapshot>,
}

/// Body of the liveness probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub message: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshot_uses_the_wire_field_names() {
        let snapshot = Snapshot {
            host: "10.0.0.1".to_string(),
            port: 5000,
            next_host: "10.0.0.2".to_string(),
            next_port: 5000,
            leader: None,
            heartbeat: 1700000000,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "host": "10.0.0.1",
                "port": 5000,
                "next_host": "10.0.0.2",
                "next_port": 5000,
                "leader": null,
                "heartbeat": 1700000000u64,
            })
        );
    }

    #[test]
    fn join_reply_parses_either_outcome() {
        let granted: JoinReply =
            serde_json::from_str(r#"{"host": "10.0.0.1", "port": 5000, "success": true}"#).unwrap();
        assert!(granted.success);
        assert_eq!(granted.port, Some(5000));

        let denied: JoinReply =
            serde_json::from_str(r#"{"message": "You are a liar!", "success": false}"#).unwrap();
        assert!(!denied.success);
        assert_eq!(denied.message.as_deref(), Some("You are a liar!"));
    }

    #[test]
    fn snapshot_next_addr_follows_the_pointer() {
        let snapshot = Snapshot {
            host: "10.0.0.1".to_string(),
            port: 5000,
            next_host: "10.0.0.2".to_string(),
            next_port: 6000,
            leader: Some(42),
            heartbeat: 0,
        };
        let next = snapshot.next_addr().unwrap();
        assert_eq!(next.to_string(), "10.0.0.2:6000");
    }
}

//! Data types exchanged with clients over WebSocket.
//! Keep this module minimal and stable: it defines the wire format.

use serde::{Deserialize, Serialize};

/// One control group as sampled in a single tick.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Absolute filesystem path.
    pub path: String,
    pub identifier: String,
    /// Percent of one core; may exceed 100.
    pub cpu_percent: f64,
    /// MiB
    pub memory: u64,
    pub pid_count: u64,
    /// Bytes per tick. Only the root node carries the system-wide value.
    pub net_delta: u64,
    pub frozen: bool,
}

/// Periodic server -> client frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ViewMessage {
    pub location: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub net_delta: u64,
    #[serde(default)]
    pub tick: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Freeze,
    Unfreeze,
}

impl ActionKind {
    /// Literal written to the freeze-control file.
    pub fn flag(self) -> &'static str {
        match self {
            ActionKind::Freeze => "1",
            ActionKind::Unfreeze => "0",
        }
    }
}

/// Server -> client reply to an `action` command.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActionAck {
    pub action: ActionKind,
    pub target: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Anything the server pushes. Frames are told apart by their fields.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    View(ViewMessage),
    Ack(ActionAck),
}

/// Client -> server frame. Every field is optional and applied independently.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ClientCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("binary frames are not part of the protocol")]
    Binary,
}

pub fn decode_command(text: &str) -> Result<ClientCommand, CommandError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode(msg: &ServerMessage) -> serde_json::Result<String> {
    serde_json::to_string(msg)
}

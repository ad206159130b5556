//! Types that mirror the agent's JSON schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub path: String,
    pub identifier: String,
    pub cpu_percent: f64,
    /// MiB
    pub memory: u64,
    #[serde(default)]
    pub pid_count: u64,
    #[serde(default)]
    pub net_delta: u64,
    #[serde(default)]
    pub frozen: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
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

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ActionAck {
    pub action: ActionKind,
    pub target: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    View(ViewMessage),
    Ack(ActionAck),
}

/// Command frame; unset fields are left out of the JSON.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ClientCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ClientCommand {
    pub fn navigate(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn search(q: impl Into<String>) -> Self {
        Self {
            search: Some(q.into()),
            ..Self::default()
        }
    }

    /// An empty target clears focus.
    pub fn focus(target: impl Into<String>) -> Self {
        Self {
            focus: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn action(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            action: Some(kind),
            target: Some(target.into()),
            ..Self::default()
        }
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle tag reported by a node.
///
/// The tag is passed through to the view untouched; tags this crate does not
/// know are kept verbatim in `Other` instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeState {
    Starting,
    Healthy,
    Degraded,
    Unreachable,
    Other(String),
}

impl NodeState {
    pub fn as_str(&self) -> &str {
        match self {
            NodeState::Starting => "starting",
            NodeState::Healthy => "healthy",
            NodeState::Degraded => "degraded",
            NodeState::Unreachable => "unreachable",
            NodeState::Other(tag) => tag.as_str(),
        }
    }
}

impl From<String> for NodeState {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "starting" => NodeState::Starting,
            "healthy" => NodeState::Healthy,
            "degraded" => NodeState::Degraded,
            "unreachable" => NodeState::Unreachable,
            _ => NodeState::Other(tag),
        }
    }
}

impl From<&str> for NodeState {
    fn from(tag: &str) -> Self {
        NodeState::from(tag.to_string())
    }
}

impl From<NodeState> for String {
    fn from(state: NodeState) -> Self {
        match state {
            NodeState::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body served by a node's status reporting endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeStatusReport {
    pub address: String,
    pub state: NodeState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl NodeStatusReport {
    /// Stamp the report with the time it was observed.
    pub fn observed(self, observed_at: DateTime<Utc>) -> NodeStatus {
        NodeStatus {
            address: self.address,
            state: self.state,
            observed_at,
            node_name: self.node_name,
            version: self.version,
        }
    }
}

/// One observation of a node. Never edited after construction; a new fetch
/// yields a new value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeStatus {
    pub address: String,
    pub state: NodeState,
    pub observed_at: DateTime<Utc>,

    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl NodeStatus {
    pub fn new(address: impl Into<String>, state: impl Into<NodeState>) -> Self {
        Self {
            address: address.into(),
            state: state.into(),
            observed_at: Utc::now(),
            node_name: None,
            version: None,
        }
    }
}

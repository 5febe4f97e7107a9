//! Node events delivered through the KernelCI pub/sub interface.
//!
//! A `listen` response wraps a CloudEvent serialized as a string in its
//! `data` field. The CloudEvent's own `data` is either the node that
//! changed or the keep-alive marker.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::NodeState;

/// Payload the API sends to keep idle subscriptions open.
pub const KEEP_ALIVE: &str = "BEEP";

/// The node fields an event carries that matter for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<NodeState>,
    /// `created` or `updated`
    #[serde(default)]
    pub op: Option<String>,
}

impl NodeEvent {
    /// Decode a `listen` response; `None` for keep-alives and empty messages.
    pub fn decode(message: &Value) -> AppResult<Option<Self>> {
        let cloud_event = match message.get("data") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)?,
            Some(other) => other.clone(),
        };
        match cloud_event.get("data") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s == KEEP_ALIVE => Ok(None),
            Some(data @ Value::Object(_)) => Ok(Some(serde_json::from_value(data.clone())?)),
            Some(other) => Err(AppError::Api(format!("unexpected event payload: {}", other))),
        }
    }
}

/// Which node events start a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub name: String,
    pub state: NodeState,
}

impl NodeFilter {
    pub fn matches(&self, event: &NodeEvent) -> bool {
        event.name == self.name && event.state == Some(self.state)
    }
}

impl Default for NodeFilter {
    /// Checkouts whose tarball is ready.
    fn default() -> Self {
        Self {
            name: "checkout".to_string(),
            state: NodeState::Available,
        }
    }
}

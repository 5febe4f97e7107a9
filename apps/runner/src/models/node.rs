//! KernelCI API node model.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::NodeState;

/// A node as stored by the KernelCI API (checkouts, jobs, tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Assigned by the API; absent on nodes being created
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
    /// Free-form on the API side (`pass`, `fail`, `skip`, `incomplete`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Artifact name to URL
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub artifacts: BTreeMap<String, String>,
    /// Kernel revision and other kind-specific data
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    /// UTC; the API omits the offset
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created: Option<NaiveDateTime>,
}

fn default_kind() -> String {
    "node".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Accepts both `2024-02-02T11:43:15.473000` and RFC 3339 with an offset.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(stamp) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(stamp));
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|stamp| Some(stamp.naive_utc()))
        .map_err(serde::de::Error::custom)
}

impl Node {
    /// Build the job node that groups this runner's results below `parent`.
    pub fn child_of(parent: &Node, name: &str) -> Self {
        let mut path = parent.path.clone();
        path.push(name.to_string());
        Node {
            id: None,
            kind: "job".to_string(),
            name: name.to_string(),
            path,
            group: Some(name.to_string()),
            parent: parent.id.clone(),
            state: Some(NodeState::Running),
            result: None,
            artifacts: parent.artifacts.clone(),
            data: parent.data.clone(),
            created: None,
        }
    }

    /// Short commit hash of the kernel revision, if the node carries one.
    pub fn commit(&self) -> Option<&str> {
        self.data
            .pointer("/kernel_revision/commit")
            .and_then(|c| c.as_str())
            .map(|c| c.get(..12).unwrap_or(c))
    }
}

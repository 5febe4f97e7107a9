//! Normalized `{node, child_nodes}` report submitted to KernelCI.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::TestOutcome;

/// KernelCI node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Running,
    Available,
    Closing,
    Done,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Available => "available",
            Self::Closing => "closing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `node` half of a report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    /// Present on leaves (possibly `null`) and on the finished root
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_result"
    )]
    pub result: Option<TestOutcome>,
    /// Present on the root once the pipeline has terminated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
}

// A present `"result": null` means unknown, a missing key means no result.
fn deserialize_result<'de, D>(deserializer: D) -> Result<Option<TestOutcome>, D::Error>
where
    D: Deserializer<'de>,
{
    TestOutcome::deserialize(deserializer).map(Some)
}

/// One report entry with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportNode {
    pub node: NodeData,
    #[serde(default)]
    pub child_nodes: Vec<ReportNode>,
}

impl ReportNode {
    /// A leaf carrying a test outcome.
    pub fn leaf(name: impl Into<String>, result: TestOutcome) -> Self {
        Self {
            node: NodeData {
                name: name.into(),
                result: Some(result),
                state: None,
            },
            child_nodes: Vec::new(),
        }
    }

    /// A grouping node without its own result.
    pub fn group(name: impl Into<String>, child_nodes: Vec<ReportNode>) -> Self {
        Self {
            node: NodeData {
                name: name.into(),
                result: None,
                state: None,
            },
            child_nodes,
        }
    }

    /// The canonical shape reported whenever a pipeline stage fails.
    pub fn failure(root_name: impl Into<String>) -> Self {
        Self::group(root_name, Vec::new()).finish(TestOutcome::Fail)
    }

    /// Mark this root as terminated with the given overall result.
    pub fn finish(mut self, result: TestOutcome) -> Self {
        self.node.result = Some(result);
        self.node.state = Some(NodeState::Done);
        self
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn find_child(&self, name: &str) -> Option<&ReportNode> {
        self.child_nodes.iter().find(|c| c.node.name == name)
    }

    /// Tally the outcomes of all leaves below this node.
    pub fn counts(&self) -> ResultCounts {
        let mut counts = ResultCounts::default();
        for child in &self.child_nodes {
            child.tally(&mut counts);
        }
        counts
    }

    fn tally(&self, counts: &mut ResultCounts) {
        if self.child_nodes.is_empty() {
            match self.node.result {
                Some(TestOutcome::Pass) => counts.pass += 1,
                Some(TestOutcome::Fail) => counts.fail += 1,
                Some(TestOutcome::Unknown) => counts.unknown += 1,
                None => {}
            }
            return;
        }
        for child in &self.child_nodes {
            child.tally(counts);
        }
    }
}

/// Leaf outcome totals of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCounts {
    pub pass: usize,
    pub fail: usize,
    pub unknown: usize,
}

impl ResultCounts {
    pub fn total(&self) -> usize {
        self.pass + self.fail + self.unknown
    }
}

impl std::fmt::Display for ResultCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tests: {} pass, {} fail, {} unknown",
            self.total(),
            self.pass,
            self.fail,
            self.unknown
        )
    }
}

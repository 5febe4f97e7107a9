//! Converts a result tree into the `{node, child_nodes}` report.

use crate::models::{ReportNode, ResultTree};

/// Convert `tree` into a report node called `name`.
///
/// Leaves become `{node: {name, result}, child_nodes: []}`; internal nodes
/// become `{node: {name}, child_nodes}` with children in insertion order.
pub fn to_report(name: &str, tree: &ResultTree) -> ReportNode {
    match tree {
        ResultTree::Leaf(outcome) => ReportNode::leaf(name, *outcome),
        ResultTree::Internal(children) => ReportNode::group(
            name,
            children
                .iter()
                .map(|(child_name, child)| to_report(child_name, child))
                .collect(),
        ),
    }
}

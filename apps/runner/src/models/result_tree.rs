//! Nested test result tree keyed by path segment.

use indexmap::IndexMap;

/// A tree node is either a group of named children or a single test outcome.
///
/// Children keep insertion order. Equality ignores that order, so two trees
/// built from the same records in different orders compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultTree {
    Internal(IndexMap<String, ResultTree>),
    Leaf(crate::models::TestOutcome),
}

impl ResultTree {
    /// An internal node without children.
    pub fn empty() -> Self {
        ResultTree::Internal(IndexMap::new())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ResultTree::Leaf(_))
    }

    /// Child lookup; always `None` on leaves.
    pub fn child(&self, name: &str) -> Option<&ResultTree> {
        match self {
            ResultTree::Internal(children) => children.get(name),
            ResultTree::Leaf(_) => None,
        }
    }

    /// Follow a path of segments from this node.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&ResultTree> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    /// Number of leaves below (or at) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            ResultTree::Leaf(_) => 1,
            ResultTree::Internal(children) => children.values().map(ResultTree::leaf_count).sum(),
        }
    }
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::empty()
    }
}

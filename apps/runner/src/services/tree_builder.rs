//! Builds the nested result tree from flat test records.

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{ResultTree, TestRecord};

/// Accumulates records into one tree rooted at a fixed segment.
///
/// Every record path that does not start with `root_segment` gets it
/// prepended, so all records share the same top-level group.
pub struct ResultTreeBuilder {
    root_segment: String,
    children: IndexMap<String, ResultTree>,
}

impl ResultTreeBuilder {
    pub fn new(root_segment: impl Into<String>) -> Self {
        Self {
            root_segment: root_segment.into(),
            children: IndexMap::new(),
        }
    }

    /// Insert one record.
    ///
    /// A duplicate leaf path overwrites the previous outcome. A path that
    /// would turn an existing leaf into a group, or a group into a leaf,
    /// is rejected with [`AppError::ConflictingTestIdentifier`].
    pub fn insert(&mut self, record: &TestRecord) -> AppResult<()> {
        let path = normalize(&self.root_segment, record.path());
        let Some((last, groups)) = path.split_last() else {
            return Err(AppError::InvalidTestIdentifier(record.identifier()));
        };

        let mut level = &mut self.children;
        for segment in groups {
            let node = level
                .entry(segment.to_string())
                .or_insert_with(ResultTree::empty);
            level = match node {
                ResultTree::Internal(children) => children,
                ResultTree::Leaf(_) => {
                    return Err(AppError::ConflictingTestIdentifier(path.join("/")));
                }
            };
        }

        match level.entry(last.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ResultTree::Leaf(record.outcome));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                ResultTree::Leaf(outcome) => {
                    debug!(
                        "Duplicate test identifier {}: {} replaced by {}",
                        path.join("/"),
                        outcome,
                        record.outcome
                    );
                    *outcome = record.outcome;
                }
                ResultTree::Internal(_) => {
                    return Err(AppError::ConflictingTestIdentifier(path.join("/")));
                }
            },
        }

        Ok(())
    }

    /// Insert every record, stopping at the first conflict.
    pub fn extend<'a, I>(&mut self, records: I) -> AppResult<()>
    where
        I: IntoIterator<Item = &'a TestRecord>,
    {
        records.into_iter().try_for_each(|record| self.insert(record))
    }

    /// Finish building; the returned tree is an internal node.
    pub fn build(self) -> ResultTree {
        ResultTree::Internal(self.children)
    }
}

fn normalize<'a>(root_segment: &'a str, path: &'a [String]) -> Vec<&'a str> {
    let mut normalized = Vec::with_capacity(path.len() + 1);
    if path.first().map(String::as_str) != Some(root_segment) {
        normalized.push(root_segment);
    }
    normalized.extend(path.iter().map(String::as_str));
    normalized
}

/// Build a tree from a batch of records.
pub fn build_tree<'a, I>(records: I, root_segment: &str) -> AppResult<ResultTree>
where
    I: IntoIterator<Item = &'a TestRecord>,
{
    let mut builder = ResultTreeBuilder::new(root_segment);
    builder.extend(records)?;
    Ok(builder.build())
}

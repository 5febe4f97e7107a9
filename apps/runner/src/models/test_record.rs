//! Flat test record as read from the results artifact.

use crate::error::{AppError, AppResult};
use crate::models::TestOutcome;

/// Path delimiter of test identifiers.
pub const PATH_DELIMITER: char = '/';

/// A single leaf test outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    /// Non-empty ordered sequence of non-empty name segments
    path: Vec<String>,
    pub outcome: TestOutcome,
}

impl TestRecord {
    /// Create a record from path segments.
    pub fn new<I, S>(path: I, outcome: TestOutcome) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        if path.is_empty() || path.iter().any(|s| s.is_empty()) {
            return Err(AppError::InvalidTestIdentifier(
                path.join(&PATH_DELIMITER.to_string()),
            ));
        }
        Ok(Self { path, outcome })
    }

    /// Parse a slash-delimited identifier such as `4k/generic/001`.
    pub fn parse(identifier: &str, outcome: TestOutcome) -> AppResult<Self> {
        if identifier.is_empty() {
            return Err(AppError::InvalidTestIdentifier(identifier.to_string()));
        }
        Self::new(identifier.split(PATH_DELIMITER), outcome)
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Slash-joined identifier.
    pub fn identifier(&self) -> String {
        self.path.join(&PATH_DELIMITER.to_string())
    }
}

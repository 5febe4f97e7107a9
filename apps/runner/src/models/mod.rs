//! Domain models for the fstests runner.

pub mod event;
pub mod node;
pub mod outcome;
pub mod report_node;
pub mod result_tree;
pub mod test_record;

// Re-export commonly used types
pub use event::{NodeEvent, NodeFilter};
pub use node::Node;
pub use outcome::TestOutcome;
pub use report_node::{NodeData, NodeState, ReportNode, ResultCounts};
pub use result_tree::ResultTree;
pub use test_record::TestRecord;

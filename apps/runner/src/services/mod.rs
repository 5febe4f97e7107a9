//! Pipeline services.

pub mod artifact;
pub mod command;
pub mod job;
pub mod kernelci;
pub mod listener;
pub mod pipeline;
pub mod report_converter;
pub mod stage_plan;
pub mod storage;
pub mod tree_builder;
pub mod xunit;

pub use artifact::{ArtifactWriter, JsonArtifactWriter, load_report};
pub use command::{CommandRunner, CommandStatus, Invocation, ProcessRunner};
pub use job::{FstestsJob, JobReport};
pub use kernelci::{KernelCiClient, NODE_CHANNEL, ResultsSink};
pub use listener::CheckoutListener;
pub use pipeline::{PipelineController, PipelineOutcome, Stage, StageResult};
pub use report_converter::to_report;
pub use stage_plan::StagePlan;
pub use storage::StorageUploader;
pub use tree_builder::{ResultTreeBuilder, build_tree};
pub use xunit::{parse_xunit, parse_xunit_file};

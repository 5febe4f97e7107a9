//! E2E tests: a failing stage ends the run with the canonical failure.

use std::sync::Arc;

use fstests_lib::models::{NodeState, ReportNode, TestOutcome};
use fstests_lib::services::{ArtifactWriter, JsonArtifactWriter, PipelineController, Stage};
use serde_json::json;

use super::test_helpers::*;

/// (1) Build failure → later stages never run, failure report returned.
#[tokio::test]
async fn test_build_failure_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::misbehaving_at(
        Stage::BuildKernel,
        Misbehavior::ExitCode(2),
    ));
    let outcome = controller(pipeline_config(dir.path()), runner.clone())
        .run()
        .await;

    assert_eq!(outcome.failed_stage(), Some(Stage::BuildKernel));
    assert_eq!(runner.labels(), vec!["configure_kernel", "build_kernel"]);

    let report = outcome.into_report();
    assert_eq!(report, ReportNode::failure("fstests"));
    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({
            "node": { "name": "fstests", "result": "fail", "state": "done" },
            "child_nodes": []
        })
    );
}

/// (2) Every command stage short-circuits the same way.
#[tokio::test]
async fn test_each_command_stage_fails_fast() {
    for (index, stage) in Stage::COMMAND_STAGES.into_iter().enumerate() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::misbehaving_at(
            stage,
            Misbehavior::ExitCode(1),
        ));
        let outcome = controller(pipeline_config(dir.path()), runner.clone())
            .run()
            .await;

        assert_eq!(outcome.failed_stage(), Some(stage));
        assert_eq!(outcome.report(), &ReportNode::failure("fstests"));
        assert_eq!(
            runner.labels().len(),
            index + 1,
            "stages after {} must not run",
            stage
        );
    }
}

/// (3) A command fault is a stage failure, not an error.
#[tokio::test]
async fn test_command_fault_becomes_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::misbehaving_at(
        Stage::RunTests,
        Misbehavior::Fault,
    ));
    let outcome = controller(pipeline_config(dir.path()), runner.clone())
        .run()
        .await;

    assert_eq!(outcome.failed_stage(), Some(Stage::RunTests));
    assert!(!runner.labels().contains(&"retrieve_results".to_string()));
    assert_eq!(outcome.report().node.state, Some(NodeState::Done));
    assert_eq!(outcome.report().node.result, Some(TestOutcome::Fail));
}

/// (4) Retrieval exits cleanly but produced no file → parse stage fails.
#[tokio::test]
async fn test_missing_artifact_fails_parse_stage() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::without_artifact());
    let outcome = controller(pipeline_config(dir.path()), runner.clone())
        .run()
        .await;

    assert_eq!(outcome.failed_stage(), Some(Stage::ParseAndConvert));
    assert_eq!(outcome.into_report(), ReportNode::failure("fstests"));
    assert!(!dir.path().join("results.json").exists());
}

/// (5) Malformed xunit → parse stage fails.
#[tokio::test]
async fn test_malformed_artifact_fails_parse_stage() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::with_artifact(
        "<testsuite><testcase name=\"generic/001\">",
    ));
    let outcome = controller(pipeline_config(dir.path()), runner)
        .run()
        .await;

    assert_eq!(outcome.failed_stage(), Some(Stage::ParseAndConvert));
}

/// (6) Persist failure → failure outcome at the persist stage.
#[tokio::test]
async fn test_persist_failure_becomes_failure() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the report directory should be
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "").unwrap();

    let runner = Arc::new(ScriptedRunner::succeeding());
    let writer: Arc<dyn ArtifactWriter> = Arc::new(JsonArtifactWriter::new(blocked.join("out")));
    let controller =
        PipelineController::new(pipeline_config(dir.path()), runner.clone(), writer).unwrap();
    let outcome = controller.run().await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Persist));
    assert_eq!(outcome.into_report(), ReportNode::failure("fstests"));
    assert_eq!(runner.labels().len(), 4);
}

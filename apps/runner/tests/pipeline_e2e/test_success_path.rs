//! E2E tests: full runs that reach the persist stage.

use std::path::PathBuf;
use std::sync::Arc;

use fstests_lib::config::{Execution, GceSettings};
use fstests_lib::models::{NodeState, ReportNode, TestOutcome};
use fstests_lib::services::{Stage, load_report};

use super::test_helpers::*;

fn leaf<'a>(report: &'a ReportNode, path: &[&str]) -> &'a ReportNode {
    path.iter().fold(report, |node, name| {
        node.find_child(name)
            .unwrap_or_else(|| panic!("missing child {} below {}", name, node.name()))
    })
}

/// (1) All stages pass → nested report with per-test results, persisted.
#[tokio::test]
async fn test_full_run_builds_nested_report() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::succeeding());
    let outcome = controller(pipeline_config(dir.path()), runner.clone())
        .run()
        .await;

    assert!(outcome.is_success(), "unexpected failure: {:?}", outcome);
    assert_eq!(
        runner.labels(),
        vec![
            "configure_kernel",
            "build_kernel",
            "run_tests",
            "retrieve_results"
        ]
    );

    let report = outcome.report();
    assert_eq!(report.name(), "fstests");
    assert_eq!(report.node.result, Some(TestOutcome::Pass));
    assert_eq!(report.node.state, Some(NodeState::Done));

    let generic = leaf(report, &["ext4", "4k", "generic"]);
    assert_eq!(generic.node.result, None);
    let names: Vec<&str> = generic.child_nodes.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["001", "002", "003"]);

    assert_eq!(
        leaf(generic, &["001"]).node.result,
        Some(TestOutcome::Pass)
    );
    assert_eq!(
        leaf(generic, &["002"]).node.result,
        Some(TestOutcome::Fail)
    );
    assert_eq!(
        leaf(generic, &["003"]).node.result,
        Some(TestOutcome::Unknown)
    );
    assert!(leaf(generic, &["003"]).child_nodes.is_empty());

    let counts = report.counts();
    assert_eq!((counts.pass, counts.fail, counts.unknown), (1, 1, 1));

    let persisted = load_report(&dir.path().join("results.json")).await.unwrap();
    assert_eq!(&persisted, report);
}

/// (2) Unknown results serialize as an explicit null, groups carry no result.
#[tokio::test]
async fn test_report_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::succeeding());
    let outcome = controller(pipeline_config(dir.path()), runner).run().await;

    let value = serde_json::to_value(outcome.report()).unwrap();
    assert_eq!(value["node"]["result"], "pass");
    assert_eq!(value["node"]["state"], "done");

    let ext4 = &value["child_nodes"][0];
    assert_eq!(ext4["node"]["name"], "ext4");
    assert!(ext4["node"].get("result").is_none());

    let generic = &ext4["child_nodes"][0]["child_nodes"][0];
    let skipped = &generic["child_nodes"][2];
    assert_eq!(skipped["node"]["name"], "003");
    assert!(skipped["node"]["result"].is_null());
    assert!(skipped["node"].get("result").is_some());
    assert_eq!(skipped["child_nodes"], serde_json::json!([]));
}

/// (3) Skip-build runs no build commands and still completes.
#[tokio::test]
async fn test_skip_build_starts_at_run_tests() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config(dir.path());
    config.skip_build = true;
    config.src_dir = None;
    let runner = Arc::new(ScriptedRunner::succeeding());
    let outcome = controller(config, runner.clone()).run().await;

    assert!(outcome.is_success());
    assert_eq!(runner.labels(), vec!["run_tests", "retrieve_results"]);
}

/// (4) Commands run in their own directories; retrieval lands in the workspace.
#[tokio::test]
async fn test_invocations_carry_working_directories() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::succeeding());
    controller(pipeline_config(dir.path()), runner.clone())
        .run()
        .await;

    let invocations = runner.invocations();
    assert_eq!(invocations[0].cwd, dir.path().join("linux"));
    assert_eq!(invocations[1].cwd, dir.path().join("linux"));
    assert_eq!(invocations[2].cwd, PathBuf::from("/opt/xfstests-bld"));
    assert_eq!(invocations[3].cwd, dir.path());
    assert!(dir.path().join("result-4k.xml").exists());
}

/// (5) An empty result set still completes with a bare root.
#[tokio::test]
async fn test_empty_results_complete() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::with_artifact(
        r#"<testsuite name="xfstests" tests="0"/>"#,
    ));
    let outcome = controller(pipeline_config(dir.path()), runner).run().await;

    assert_eq!(outcome.failed_stage(), None::<Stage>);
    let report = outcome.into_report();
    assert!(report.child_nodes.is_empty());
    assert_eq!(report.node.result, Some(TestOutcome::Pass));
}

/// (6) Records without a config suffix nest directly below the filesystem.
#[tokio::test]
async fn test_two_records_nest_below_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::with_artifact(
        r#"<testsuite name="xfstests">
  <testcase classname="xfstests" name="ext4/generic/001"/>
  <testcase classname="xfstests" name="generic/002"><failure/></testcase>
</testsuite>"#,
    ));
    let outcome = controller(pipeline_config(dir.path()), runner).run().await;

    assert!(outcome.is_success());
    let expected = ReportNode::group(
        "fstests",
        vec![ReportNode::group(
            "ext4",
            vec![ReportNode::group(
                "generic",
                vec![
                    ReportNode::leaf("001", TestOutcome::Pass),
                    ReportNode::leaf("002", TestOutcome::Fail),
                ],
            )],
        )],
    )
    .finish(TestOutcome::Pass);
    assert_eq!(outcome.into_report(), expected);
}

/// (7) GCE runs go through gce-xfstests and fetch results from the bucket.
#[tokio::test]
async fn test_gce_run_copies_results_from_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config(dir.path());
    config.skip_build = true;
    config.execution = Execution::Gce(GceSettings {
        gs_bucket: "kernelci-fstests".to_string(),
        ..GceSettings::default()
    });
    let runner = Arc::new(ScriptedRunner::succeeding());
    let outcome = controller(config, runner.clone()).run().await;

    assert!(outcome.is_success(), "unexpected failure: {:?}", outcome);
    let invocations = runner.invocations();
    assert_eq!(invocations[0].program, "/opt/xfstests-bld/gce-xfstests");
    assert_eq!(invocations[1].program, "gsutil");
    assert!(invocations[1].args[1].starts_with("gs://kernelci-fstests/results/"));
    assert!(dir.path().join("result-4k.xml").exists());

    let counts = outcome.report().counts();
    assert_eq!((counts.pass, counts.fail, counts.unknown), (1, 1, 1));
}

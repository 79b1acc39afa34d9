//! End-to-end orchestration scenarios against mock collaborators.
//!
//! These tests drive the full phase sequence and assert both the terminal
//! verdict and that phases after a failure are never attempted.

use crate::clients::{
    MockCiServer, MockCluster, MockQualityScanner, MockScmServer, ScanReport,
};
use crate::errors::HarnessError;
use crate::expectation::{ExpectationTree, StageExpectation};
use crate::orchestrator::{
    ComponentSpec, GoldenFixtures, Orchestrator, Verdict, VerificationPhase,
};
use crate::poller::PollerConfig;
use crate::trace::{RunHandle, RunStatus, StageNode, StageStatus, StageTree, TestSummary};
use std::sync::Arc;
use std::time::Duration;

fn fixtures() -> GoldenFixtures {
    GoldenFixtures::new(
        ExpectationTree::new(vec![
            StageExpectation::new("Checkout"),
            StageExpectation::new("Create-Repo"),
        ]),
        ExpectationTree::new(vec![
            StageExpectation::new("Checkout"),
            StageExpectation::new("Build"),
            StageExpectation::new("Test"),
        ]),
    )
}

fn provisioning_tree() -> StageTree {
    StageTree::new(vec![
        StageNode::new("Checkout", StageStatus::Success),
        StageNode::new("Create-Repo", StageStatus::Success),
    ])
}

fn build_tree(test_status: StageStatus) -> StageTree {
    StageTree::new(vec![
        StageNode::new("Checkout", StageStatus::Success),
        StageNode::new("Build", StageStatus::Success),
        StageNode::new("Test", test_status),
    ])
}

fn component() -> ComponentSpec {
    ComponentSpec::new("docgen", "proj")
        .with_repo_base("https://scm.example.com")
        .with_expected_unit_tests(14)
}

/// CI mock that triggers and polls both pipelines successfully, with the
/// given build-phase stage tree.
fn passing_ci(build: StageTree) -> MockCiServer {
    let mut ci = MockCiServer::new();
    ci.expect_trigger()
        .returning(|request| Ok(RunHandle::new(&request.job_name, "1")));
    ci.expect_run_status().returning(|_| Ok(RunStatus::Success));
    ci.expect_stage_tree().returning(move |run| {
        if run.job == "unitt-docgen" {
            Ok(build.clone())
        } else {
            Ok(provisioning_tree())
        }
    });
    ci
}

fn passing_scm() -> MockScmServer {
    let mut scm = MockScmServer::new();
    scm.expect_recreate_project_repo()
        .times(1)
        .returning(|_, _| Ok(()));
    scm
}

fn passing_scanner() -> MockQualityScanner {
    let mut scanner = MockQualityScanner::new();
    scanner
        .expect_latest_scan()
        .returning(|_| Ok(Some(ScanReport { gate_passed: true, conditions: Vec::new() })));
    scanner
}

fn passing_cluster() -> MockCluster {
    let mut cluster = MockCluster::new();
    cluster
        .expect_image_stream_tags()
        .returning(|_, _| Ok(vec!["master".to_string()]));
    cluster.expect_build_config_exists().returning(|_, _| Ok(true));
    cluster.expect_image_stream_exists().returning(|_, _| Ok(true));
    cluster
}

fn orchestrator(
    ci: MockCiServer,
    scm: MockScmServer,
    scanner: MockQualityScanner,
    cluster: MockCluster,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ci),
        Arc::new(scm),
        Arc::new(scanner),
        Arc::new(cluster),
        fixtures(),
    )
    .with_poller_config(
        PollerConfig::new()
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(5)),
    )
}

#[tokio::test(start_paused = true)]
async fn scenario_all_phases_pass() {
    let mut ci = passing_ci(build_tree(StageStatus::Success));
    ci.expect_attachments().returning(|_| {
        Ok(vec!["SCRR-proj-docgen.docx".to_string(), "SCRR-proj-docgen.md".to_string()])
    });
    ci.expect_test_summary()
        .returning(|_| Ok(TestSummary { total: 14, failed: 0, skipped: 0 }));

    let verdict = orchestrator(ci, passing_scm(), passing_scanner(), passing_cluster())
        .verify(&component())
        .await;

    assert!(verdict.is_pass());
    assert_eq!(verdict.exit_code(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_build_failure_skips_later_phases() {
    let mut ci = passing_ci(build_tree(StageStatus::Failure));
    // Later phases must never be attempted.
    ci.expect_attachments().never();
    ci.expect_test_summary().never();
    let mut scanner = MockQualityScanner::new();
    scanner.expect_latest_scan().never();
    let mut cluster = MockCluster::new();
    cluster.expect_image_stream_tags().never();
    cluster.expect_build_config_exists().never();
    cluster.expect_image_stream_exists().never();

    let verdict = orchestrator(ci, passing_scm(), scanner, cluster)
        .verify(&component())
        .await;

    match verdict {
        Verdict::FailedAt { phase, cause } => {
            assert_eq!(phase, VerificationPhase::Build);
            match cause {
                HarnessError::StageMismatch(mismatch) => {
                    assert_eq!(mismatch.phase, "build");
                    assert_eq!(mismatch.discrepancies.len(), 1);
                    assert_eq!(mismatch.discrepancies[0].path, "2:Test");
                }
                other => panic!("expected stage mismatch, got {other}"),
            }
        }
        Verdict::AllPhasesPassed => panic!("expected failure at build phase"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_unit_test_count_regression() {
    let mut ci = passing_ci(build_tree(StageStatus::Success));
    ci.expect_attachments().returning(|_| {
        Ok(vec!["SCRR-proj-docgen.docx".to_string(), "SCRR-proj-docgen.md".to_string()])
    });
    // 13 executed instead of the expected 14.
    ci.expect_test_summary()
        .returning(|_| Ok(TestSummary { total: 13, failed: 0, skipped: 0 }));
    let mut cluster = MockCluster::new();
    cluster.expect_image_stream_tags().never();
    cluster.expect_build_config_exists().never();
    cluster.expect_image_stream_exists().never();

    let verdict = orchestrator(ci, passing_scm(), passing_scanner(), cluster)
        .verify(&component())
        .await;

    match verdict {
        Verdict::FailedAt { phase, cause } => {
            assert_eq!(phase, VerificationPhase::UnitTests);
            match cause {
                HarnessError::TestCountMismatch(mismatch) => {
                    assert_eq!(mismatch.expected, 14);
                    assert_eq!(mismatch.actual, 13);
                }
                other => panic!("expected count mismatch, got {other}"),
            }
        }
        Verdict::AllPhasesPassed => panic!("expected failure at unit-tests phase"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_missing_artifact() {
    let mut ci = passing_ci(build_tree(StageStatus::Success));
    ci.expect_attachments()
        .returning(|_| Ok(vec!["SCRR-proj-docgen.docx".to_string()]));
    ci.expect_test_summary().never();

    let verdict = orchestrator(ci, passing_scm(), passing_scanner(), passing_cluster())
        .verify(&component())
        .await;

    match verdict {
        Verdict::FailedAt { phase, cause } => {
            assert_eq!(phase, VerificationPhase::Artifacts);
            match cause {
                HarnessError::MissingArtifact(missing) => {
                    assert_eq!(missing.missing, vec!["SCRR-proj-docgen.md".to_string()]);
                }
                other => panic!("expected missing artifact, got {other}"),
            }
        }
        Verdict::AllPhasesPassed => panic!("expected failure at artifacts phase"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_wrong_image_tag() {
    let mut ci = passing_ci(build_tree(StageStatus::Success));
    ci.expect_attachments().returning(|_| {
        Ok(vec!["SCRR-proj-docgen.docx".to_string(), "SCRR-proj-docgen.md".to_string()])
    });
    ci.expect_test_summary()
        .returning(|_| Ok(TestSummary { total: 14, failed: 0, skipped: 0 }));
    let mut cluster = MockCluster::new();
    cluster
        .expect_image_stream_tags()
        .returning(|_, _| Ok(vec!["feature_x".to_string()]));
    cluster.expect_build_config_exists().never();
    cluster.expect_image_stream_exists().never();

    // The component is built from "main", so the derived tag must be "main".
    let spec = component().with_ref_spec("main");

    let verdict = orchestrator(ci, passing_scm(), passing_scanner(), cluster)
        .verify(&spec)
        .await;

    match verdict {
        Verdict::FailedAt { phase, cause } => {
            assert_eq!(phase, VerificationPhase::ClusterResources);
            match cause {
                HarnessError::ResourceState(state) => {
                    assert_eq!(state.name, "docgen");
                    assert!(state.detail.contains("main"));
                    assert!(state.detail.contains("feature_x"));
                }
                other => panic!("expected resource state error, got {other}"),
            }
        }
        Verdict::AllPhasesPassed => panic!("expected failure at cluster-resources phase"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_provisioning_trace_divergence_stops_everything() {
    let mut ci = MockCiServer::new();
    ci.expect_trigger()
        .times(1)
        .returning(|request| Ok(RunHandle::new(&request.job_name, "1")));
    ci.expect_run_status().returning(|_| Ok(RunStatus::Success));
    // The provisioning pipeline skipped its second stage.
    ci.expect_stage_tree().returning(|_| {
        Ok(StageTree::new(vec![StageNode::new("Checkout", StageStatus::Success)]))
    });
    ci.expect_attachments().never();
    ci.expect_test_summary().never();
    let mut scanner = MockQualityScanner::new();
    scanner.expect_latest_scan().never();
    let mut cluster = MockCluster::new();
    cluster.expect_image_stream_tags().never();
    cluster.expect_build_config_exists().never();
    cluster.expect_image_stream_exists().never();

    let verdict = orchestrator(ci, passing_scm(), scanner, cluster)
        .verify(&component())
        .await;

    match verdict {
        Verdict::FailedAt { phase, .. } => {
            assert_eq!(phase, VerificationPhase::Provisioning);
        }
        Verdict::AllPhasesPassed => panic!("expected failure at provisioning phase"),
    }
}

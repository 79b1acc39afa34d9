//! Artifact, quality, unit-test, and cluster resource verifiers.
//!
//! Each verifier takes a collaborator trait and fails fast with its specific
//! error kind; none of them retries or remediates.

use crate::clients::{CiServer, Cluster, QualityScanner};
use crate::errors::{
    HarnessError, MissingArtifactError, QualityGateFailedError, ResourceStateError,
    ScanNotFoundError, TestCountMismatchError,
};
use crate::expectation::{ResourceExpectation, ResourceKind};
use crate::trace::RunHandle;
use tracing::{debug, info};

/// Verifies that every expected artifact is attached to the run.
///
/// Set containment, not exact-set equality: extra attachments are tolerated.
///
/// # Errors
///
/// [`MissingArtifactError`] naming every absent required file, or a client
/// error if the attachment listing cannot be fetched.
pub async fn verify_artifacts(
    ci: &dyn CiServer,
    run: &RunHandle,
    expected: &[String],
) -> Result<(), HarnessError> {
    let attached = ci.attachments(run).await?;
    debug!(run = %run, attached = attached.len(), "fetched run attachments");

    let missing: Vec<String> = expected
        .iter()
        .filter(|name| !attached.contains(name))
        .cloned()
        .collect();
    if missing.is_empty() {
        info!(run = %run, "all {} expected artifacts attached", expected.len());
        Ok(())
    } else {
        Err(MissingArtifactError::new(run.to_string(), missing).into())
    }
}

/// Verifies that the latest quality scan for the repository passed its gate.
///
/// # Errors
///
/// [`ScanNotFoundError`] when the repository has never been scanned (distinct
/// from "ran and failed"), [`QualityGateFailedError`] when the gate did not
/// pass.
pub async fn verify_quality(
    scanner: &dyn QualityScanner,
    repo_name: &str,
) -> Result<(), HarnessError> {
    let report = scanner
        .latest_scan(repo_name)
        .await?
        .ok_or_else(|| ScanNotFoundError::new(repo_name))?;
    if report.gate_passed {
        info!(repo = repo_name, "quality gate passed");
        Ok(())
    } else {
        Err(QualityGateFailedError::new(repo_name, report.failed_conditions()).into())
    }
}

/// Verifies the executed unit-test count of the run.
///
/// Exact equality, not a minimum bound: a changed count is itself a signal
/// of an unintended regression in the component under test.
///
/// # Errors
///
/// [`TestCountMismatchError`] on any discrepancy.
pub async fn verify_unit_test_count(
    ci: &dyn CiServer,
    run: &RunHandle,
    expected: u64,
) -> Result<(), HarnessError> {
    let summary = ci.test_summary(run).await?;
    if summary.total == expected {
        info!(run = %run, count = expected, "unit-test count matches");
        Ok(())
    } else {
        Err(TestCountMismatchError::new(expected, summary.total).into())
    }
}

/// Verifies that the cluster holds every declared resource.
///
/// Fails fast on the first missing or mismatched resource; no partial
/// remediation is attempted.
///
/// # Errors
///
/// [`ResourceStateError`] naming the kind, name, and namespace of the first
/// offending resource.
pub async fn verify_resources(
    cluster: &dyn Cluster,
    expectation: &ResourceExpectation,
) -> Result<(), HarnessError> {
    let namespace = &expectation.namespace;

    for image_tag in &expectation.image_tags {
        let tags = cluster.image_stream_tags(namespace, &image_tag.name).await?;
        if !tags.contains(&image_tag.tag) {
            return Err(ResourceStateError::new(
                ResourceKind::ImageTag,
                &image_tag.name,
                namespace,
                format!("expected tag '{}', found [{}]", image_tag.tag, tags.join(", ")),
            )
            .into());
        }
        debug!(namespace, name = %image_tag.name, tag = %image_tag.tag, "image tag present");
    }

    for name in &expectation.build_configs {
        if !cluster.build_config_exists(namespace, name).await? {
            return Err(ResourceStateError::new(
                ResourceKind::BuildConfig,
                name,
                namespace,
                "not found",
            )
            .into());
        }
        debug!(namespace, name = %name, "build config present");
    }

    for name in &expectation.image_streams {
        if !cluster.image_stream_exists(namespace, name).await? {
            return Err(ResourceStateError::new(
                ResourceKind::ImageStream,
                name,
                namespace,
                "not found",
            )
            .into());
        }
        debug!(namespace, name = %name, "image stream present");
    }

    info!(namespace, "all declared cluster resources present");
    Ok(())
}

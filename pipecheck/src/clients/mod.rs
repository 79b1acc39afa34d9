//! External collaborator interfaces and their HTTP implementations.
//!
//! The harness consumes four remote systems with fixed interfaces: the CI
//! server (trigger/status/trace/attachments/test results), the SCM
//! provisioning API, the quality-scan server, and the cluster control
//! plane. The traits here are the seams; the `*Client` types are the
//! reqwest-backed implementations used by the batch runner. Tests inject
//! mocks at the trait level.

mod bitbucket;
mod jenkins;
mod openshift;
mod sonar;

pub use bitbucket::BitbucketClient;
pub use jenkins::JenkinsClient;
pub use openshift::OpenShiftClient;
pub use sonar::SonarClient;

use crate::errors::ClientError;
use crate::trace::{RunHandle, RunStatus, StageTree, TestSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to start one named pipeline run.
///
/// Recognized parameter keys (component id, git URL, target namespace) are
/// set by the orchestrator; unrecognized keys are passed through verbatim to
/// the remote engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// The job to trigger.
    pub job_name: String,
    /// The SCM project hosting the pipeline source.
    pub scm_project: String,
    /// The git ref of the pipeline source to run.
    pub ref_spec: String,
    /// The project owning the pipeline.
    pub pipeline_owner: String,
    /// Path to the pipeline definition within its repository.
    pub pipeline_path: String,
    /// The project/namespace the run executes in.
    pub target_project: String,
    /// Named trigger parameters, in deterministic order.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl TriggerRequest {
    /// Creates a new trigger request without parameters.
    #[must_use]
    pub fn new(
        job_name: impl Into<String>,
        scm_project: impl Into<String>,
        ref_spec: impl Into<String>,
        pipeline_owner: impl Into<String>,
        pipeline_path: impl Into<String>,
        target_project: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            scm_project: scm_project.into(),
            ref_spec: ref_spec.into(),
            pipeline_owner: pipeline_owner.into(),
            pipeline_path: pipeline_path.into(),
            target_project: target_project.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a named trigger parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds all given parameters.
    #[must_use]
    pub fn with_parameters<K, V>(mut self, parameters: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// One condition of a quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCondition {
    /// The measured metric.
    pub metric: String,
    /// The condition status as reported by the scanner.
    pub status: String,
}

impl GateCondition {
    /// Returns true if this condition passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// The latest quality-scan report for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Whether the overall quality gate passed.
    pub gate_passed: bool,
    /// Individual gate conditions.
    #[serde(default)]
    pub conditions: Vec<GateCondition>,
}

impl ScanReport {
    /// The metrics of all conditions that did not pass.
    #[must_use]
    pub fn failed_conditions(&self) -> Vec<String> {
        self.conditions
            .iter()
            .filter(|c| !c.passed())
            .map(|c| c.metric.clone())
            .collect()
    }
}

/// CI trigger/status/artifact API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CiServer: Send + Sync {
    /// Submits a pipeline run. Starts exactly one remote execution; never
    /// idempotent.
    async fn trigger(&self, request: &TriggerRequest) -> Result<RunHandle, ClientError>;

    /// Fetches the current status of a run.
    async fn run_status(&self, run: &RunHandle) -> Result<RunStatus, ClientError>;

    /// Fetches the realized stage tree of a terminal run.
    async fn stage_tree(&self, run: &RunHandle) -> Result<StageTree, ClientError>;

    /// Lists the file names attached to a run.
    async fn attachments(&self, run: &RunHandle) -> Result<Vec<String>, ClientError>;

    /// Fetches the unit-test result summary of a run.
    async fn test_summary(&self, run: &RunHandle) -> Result<TestSummary, ClientError>;
}

/// SCM provisioning API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScmServer: Send + Sync {
    /// Deletes any existing repository of that name and creates a fresh one
    /// under the given project.
    async fn recreate_project_repo(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<(), ClientError>;
}

/// Quality-scan API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QualityScanner: Send + Sync {
    /// Fetches the latest scan report for a repository, or `None` if the
    /// repository has never been scanned.
    async fn latest_scan(&self, repo_name: &str) -> Result<Option<ScanReport>, ClientError>;
}

/// Cluster query API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Returns true if the named image stream exists in the namespace.
    async fn image_stream_exists(&self, namespace: &str, name: &str)
        -> Result<bool, ClientError>;

    /// Returns true if the named build config exists in the namespace.
    async fn build_config_exists(&self, namespace: &str, name: &str)
        -> Result<bool, ClientError>;

    /// Lists the tags present on the named image stream. Empty when the
    /// stream does not exist or carries no tags.
    async fn image_stream_tags(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>, ClientError>;
}

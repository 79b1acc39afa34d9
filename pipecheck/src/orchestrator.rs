//! Verification orchestrator.
//!
//! Sequences the poller, matcher, and verifiers into the fixed phase order
//! for one component-under-test. Each phase transition requires the prior
//! phase's success; on failure the orchestration halts immediately and
//! attributes the failure to the current phase. Exactly one terminal phase
//! and cause are reported per run.

use crate::cancellation::CancellationToken;
use crate::clients::{CiServer, Cluster, QualityScanner, ScmServer, TriggerRequest};
use crate::errors::{FixtureError, HarnessError};
use crate::expectation::{
    derived_image_tag, ExpectationTree, ImageTagExpectation, ResourceExpectation,
};
use crate::matcher::compare;
use crate::poller::{PipelineRunPoller, PollerConfig};
use crate::trace::RunHandle;
use crate::verify::{
    verify_artifacts, verify_quality, verify_resources, verify_unit_test_count,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// One ordered step of the overall verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationPhase {
    /// Provisioning pipeline runs and its stage trace matches the golden
    /// expectation.
    Provisioning,
    /// Build pipeline runs and its stage trace matches the golden
    /// expectation.
    Build,
    /// The quality gate of the latest scan passed.
    QualityScan,
    /// Required artifacts are attached to the build run.
    Artifacts,
    /// The executed unit-test count matches exactly.
    UnitTests,
    /// The cluster holds the expected deployable resources.
    ClusterResources,
}

impl VerificationPhase {
    /// All phases in execution order.
    pub const ORDER: [Self; 6] = [
        Self::Provisioning,
        Self::Build,
        Self::QualityScan,
        Self::Artifacts,
        Self::UnitTests,
        Self::ClusterResources,
    ];

    /// The phase following this one, or `None` after the last.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Provisioning => Some(Self::Build),
            Self::Build => Some(Self::QualityScan),
            Self::QualityScan => Some(Self::Artifacts),
            Self::Artifacts => Some(Self::UnitTests),
            Self::UnitTests => Some(Self::ClusterResources),
            Self::ClusterResources => None,
        }
    }
}

impl fmt::Display for VerificationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Build => write!(f, "build"),
            Self::QualityScan => write!(f, "quality-scan"),
            Self::Artifacts => write!(f, "artifacts"),
            Self::UnitTests => write!(f, "unit-tests"),
            Self::ClusterResources => write!(f, "cluster-resources"),
        }
    }
}

/// The terminal outcome of one verification run.
#[derive(Debug)]
pub enum Verdict {
    /// Every phase passed.
    AllPhasesPassed,
    /// The orchestration halted at a phase; later phases were never
    /// attempted.
    FailedAt {
        /// The phase the failure is attributed to.
        phase: VerificationPhase,
        /// The originating cause.
        cause: HarnessError,
    },
}

impl Verdict {
    /// Returns true if every phase passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::AllPhasesPassed)
    }

    /// Process exit code for batch invocation.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_pass())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllPhasesPassed => write!(f, "all phases passed"),
            Self::FailedAt { phase, cause } => {
                write!(f, "failed at phase '{phase}': {cause}")
            }
        }
    }
}

/// Golden stage expectations, one tree per pipeline-running phase.
#[derive(Debug, Clone)]
pub struct GoldenFixtures {
    /// Expected stage tree of the provisioning pipeline.
    pub provisioning: ExpectationTree,
    /// Expected stage tree of the build pipeline.
    pub build: ExpectationTree,
}

impl GoldenFixtures {
    /// Creates fixtures from already-loaded trees.
    #[must_use]
    pub fn new(provisioning: ExpectationTree, build: ExpectationTree) -> Self {
        Self { provisioning, build }
    }

    /// Loads `provision-stages.json` and `build-stages.json` from a fixture
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] if either file cannot be read or parsed.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let dir = dir.as_ref();
        Ok(Self {
            provisioning: ExpectationTree::load(dir.join("provision-stages.json"))?,
            build: ExpectationTree::load(dir.join("build-stages.json"))?,
        })
    }
}

/// Identity and expectations of one component-under-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Logical component identifier (e.g. `docgen`).
    pub component_id: String,
    /// SCM project the component repository lives in.
    pub scm_project: String,
    /// Project/namespace the pipeline runs execute in.
    pub cd_project: String,
    /// Cluster namespace that receives the deployable resources.
    pub test_namespace: String,
    /// Git ref of the component repository.
    pub ref_spec: String,
    /// Base URL for git clone URLs.
    pub repo_base: String,
    /// Job that provisions the component.
    pub provision_job: String,
    /// SCM project owning the provisioning pipeline.
    pub provision_owner: String,
    /// Git ref of the provisioning pipeline repository.
    pub provision_ref: String,
    /// Path of the provisioning pipeline definition within its repository.
    pub provision_path: String,
    /// Artifact names that must be attached to the build run.
    pub expected_artifacts: Vec<String>,
    /// Exact number of unit tests the build run must report.
    pub expected_unit_tests: u64,
    /// Additional trigger parameters passed through verbatim.
    #[serde(default)]
    pub extra_parameters: BTreeMap<String, String>,
}

impl ComponentSpec {
    /// Creates a spec with conventional defaults derived from the component
    /// id and SCM project.
    #[must_use]
    pub fn new(component_id: impl Into<String>, scm_project: impl Into<String>) -> Self {
        let component_id = component_id.into();
        let scm_project = scm_project.into();
        let project_lower = scm_project.to_lowercase();
        let repo_name = format!("{project_lower}-{component_id}");
        Self {
            cd_project: format!("{project_lower}-cd"),
            test_namespace: format!("{project_lower}-test"),
            ref_spec: "master".to_string(),
            repo_base: String::new(),
            provision_job: "quickstarters".to_string(),
            provision_owner: "quickstarters".to_string(),
            provision_ref: "master".to_string(),
            provision_path: format!("{component_id}/Jenkinsfile"),
            expected_artifacts: vec![
                format!("SCRR-{repo_name}.docx"),
                format!("SCRR-{repo_name}.md"),
            ],
            expected_unit_tests: 0,
            extra_parameters: BTreeMap::new(),
            component_id,
            scm_project,
        }
    }

    /// Sets the component git ref.
    #[must_use]
    pub fn with_ref_spec(mut self, ref_spec: impl Into<String>) -> Self {
        self.ref_spec = ref_spec.into();
        self
    }

    /// Sets the clone URL base.
    #[must_use]
    pub fn with_repo_base(mut self, repo_base: impl Into<String>) -> Self {
        self.repo_base = repo_base.into();
        self
    }

    /// Sets the provisioning pipeline identity.
    #[must_use]
    pub fn with_provision_pipeline(
        mut self,
        job: impl Into<String>,
        owner: impl Into<String>,
        git_ref: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.provision_job = job.into();
        self.provision_owner = owner.into();
        self.provision_ref = git_ref.into();
        self.provision_path = path.into();
        self
    }

    /// Sets the exact expected unit-test count.
    #[must_use]
    pub fn with_expected_unit_tests(mut self, count: u64) -> Self {
        self.expected_unit_tests = count;
        self
    }

    /// Replaces the expected artifact names.
    #[must_use]
    pub fn with_expected_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.expected_artifacts = artifacts;
        self
    }

    /// Adds a pass-through trigger parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_parameters.insert(key.into(), value.into());
        self
    }

    /// The component repository name within the SCM project.
    #[must_use]
    pub fn repo_name(&self) -> String {
        format!("{}-{}", self.scm_project.to_lowercase(), self.component_id)
    }

    /// The build job name for this component.
    #[must_use]
    pub fn build_job(&self) -> String {
        format!("unitt-{}", self.component_id)
    }

    /// The HTTP clone URL of the component repository.
    #[must_use]
    pub fn git_url_http(&self) -> String {
        format!("{}/{}/{}.git", self.repo_base, self.scm_project, self.repo_name())
    }

    /// The cluster resources expected after a successful build.
    #[must_use]
    pub fn resource_expectation(&self) -> ResourceExpectation {
        ResourceExpectation {
            namespace: self.test_namespace.clone(),
            image_tags: vec![ImageTagExpectation {
                name: self.component_id.clone(),
                tag: derived_image_tag(&self.ref_spec),
            }],
            build_configs: vec![self.component_id.clone()],
            image_streams: vec![self.component_id.clone()],
        }
    }

    fn provision_request(&self) -> TriggerRequest {
        TriggerRequest::new(
            &self.provision_job,
            &self.provision_owner,
            &self.provision_ref,
            &self.scm_project,
            &self.provision_path,
            &self.cd_project,
        )
        .with_parameter("component_id", &self.component_id)
        .with_parameter("git_url_http", self.git_url_http())
        .with_parameter("namespace", &self.cd_project)
        .with_parameters(self.extra_parameters.clone())
    }

    fn build_request(&self) -> TriggerRequest {
        TriggerRequest::new(
            self.build_job(),
            &self.scm_project,
            &self.ref_spec,
            &self.scm_project,
            "Jenkinsfile",
            &self.cd_project,
        )
        .with_parameter("component_id", &self.component_id)
        .with_parameter("namespace", &self.cd_project)
        .with_parameters(self.extra_parameters.clone())
    }
}

/// State carried forward between phases: only the minimal handles later
/// phases need.
#[derive(Debug, Default)]
struct PhaseState {
    build_run: Option<RunHandle>,
}

impl PhaseState {
    fn build_run(&self) -> Result<&RunHandle, HarnessError> {
        self.build_run
            .as_ref()
            .ok_or_else(|| HarnessError::Internal("build run handle not yet recorded".to_string()))
    }
}

/// Drives all verification phases for one component-under-test.
pub struct Orchestrator {
    ci: Arc<dyn CiServer>,
    scm: Arc<dyn ScmServer>,
    scanner: Arc<dyn QualityScanner>,
    cluster: Arc<dyn Cluster>,
    poller: PipelineRunPoller,
    fixtures: GoldenFixtures,
}

impl Orchestrator {
    /// Creates an orchestrator with a default poller configuration.
    #[must_use]
    pub fn new(
        ci: Arc<dyn CiServer>,
        scm: Arc<dyn ScmServer>,
        scanner: Arc<dyn QualityScanner>,
        cluster: Arc<dyn Cluster>,
        fixtures: GoldenFixtures,
    ) -> Self {
        let poller = PipelineRunPoller::new(ci.clone(), PollerConfig::default());
        Self { ci, scm, scanner, cluster, poller, fixtures }
    }

    /// Replaces the poller configuration.
    #[must_use]
    pub fn with_poller_config(mut self, config: PollerConfig) -> Self {
        self.poller = PipelineRunPoller::new(self.ci.clone(), config);
        self
    }

    /// Attaches an external cancellation token to the polling loop.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.poller = self.poller.with_cancellation(cancel);
        self
    }

    /// Runs all phases in order for one component, halting on the first
    /// failure.
    pub async fn verify(&self, spec: &ComponentSpec) -> Verdict {
        let mut state = PhaseState::default();
        let mut current = Some(VerificationPhase::Provisioning);
        while let Some(phase) = current {
            info!(%phase, component = %spec.component_id, "starting verification phase");
            if let Err(cause) = self.run_phase(phase, spec, &mut state).await {
                error!(%phase, component = %spec.component_id, error = %cause, "verification halted");
                return Verdict::FailedAt { phase, cause };
            }
            info!(%phase, component = %spec.component_id, "verification phase passed");
            current = phase.next();
        }
        Verdict::AllPhasesPassed
    }

    async fn run_phase(
        &self,
        phase: VerificationPhase,
        spec: &ComponentSpec,
        state: &mut PhaseState,
    ) -> Result<(), HarnessError> {
        match phase {
            VerificationPhase::Provisioning => {
                self.scm
                    .recreate_project_repo(&spec.scm_project, &spec.repo_name())
                    .await?;
                let tree = self.poller.trigger_and_await(&spec.provision_request()).await?;
                compare(&tree, &self.fixtures.provisioning)
                    .into_result(phase.to_string())?;
                Ok(())
            }
            VerificationPhase::Build => {
                let (tree, run) = self
                    .poller
                    .trigger_and_await_with_run(&spec.build_request())
                    .await?;
                compare(&tree, &self.fixtures.build).into_result(phase.to_string())?;
                state.build_run = Some(run);
                Ok(())
            }
            VerificationPhase::QualityScan => {
                verify_quality(self.scanner.as_ref(), &spec.repo_name()).await
            }
            VerificationPhase::Artifacts => {
                verify_artifacts(self.ci.as_ref(), state.build_run()?, &spec.expected_artifacts)
                    .await
            }
            VerificationPhase::UnitTests => {
                verify_unit_test_count(
                    self.ci.as_ref(),
                    state.build_run()?,
                    spec.expected_unit_tests,
                )
                .await
            }
            VerificationPhase::ClusterResources => {
                verify_resources(self.cluster.as_ref(), &spec.resource_expectation()).await
            }
        }
    }
}

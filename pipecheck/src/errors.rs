//! Error taxonomy for the verification harness.
//!
//! Every component fails fast with a specific error kind; nothing above the
//! poller's bounded polling loop recovers or retries. The orchestrator halts
//! on the first failure and surfaces exactly one originating phase and cause
//! per run.

use crate::expectation::ResourceKind;
use crate::matcher::Discrepancy;
use std::time::Duration;
use thiserror::Error;

/// The umbrella error type for harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The remote engine rejected the trigger request.
    #[error("{0}")]
    Trigger(#[from] TriggerError),

    /// The run did not reach a terminal status within the timeout.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Repeated polling I/O failures, distinct from "still running".
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The realized stage tree diverged from the golden expectation.
    #[error("{0}")]
    StageMismatch(#[from] StageMismatchError),

    /// Required run attachments were absent.
    #[error("{0}")]
    MissingArtifact(#[from] MissingArtifactError),

    /// The quality gate did not pass.
    #[error("{0}")]
    QualityGateFailed(#[from] QualityGateFailedError),

    /// No quality scan was found for the repository.
    #[error("{0}")]
    ScanNotFound(#[from] ScanNotFoundError),

    /// The executed unit-test count diverged from the expected count.
    #[error("{0}")]
    TestCountMismatch(#[from] TestCountMismatchError),

    /// A declared cluster resource was missing or inconsistent.
    #[error("{0}")]
    ResourceState(#[from] ResourceStateError),

    /// A golden fixture could not be loaded.
    #[error("{0}")]
    Fixture(#[from] FixtureError),

    /// The harness configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A collaborator call failed outside the poller's polling loop.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// The verification run was cancelled externally.
    #[error("verification cancelled: {0}")]
    Cancelled(String),

    /// A harness-internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error raised when the remote engine rejects a trigger request.
#[derive(Debug, Clone, Error)]
#[error("trigger rejected for job '{job}': {reason}")]
pub struct TriggerError {
    /// The job that could not be triggered.
    pub job: String,
    /// The rejection reason reported by the remote engine.
    pub reason: String,
}

impl TriggerError {
    /// Creates a new trigger error.
    #[must_use]
    pub fn new(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { job: job.into(), reason: reason.into() }
    }
}

/// Error raised when a run does not reach a terminal status in time.
#[derive(Debug, Clone, Error)]
#[error("run of job '{job}' did not reach a terminal status within {timeout:?}")]
pub struct TimeoutError {
    /// The job whose run timed out.
    pub job: String,
    /// The configured maximum wall-clock wait.
    pub timeout: Duration,
}

impl TimeoutError {
    /// Creates a new timeout error.
    #[must_use]
    pub fn new(job: impl Into<String>, timeout: Duration) -> Self {
        Self { job: job.into(), timeout }
    }
}

/// Error raised after repeated polling I/O failures.
#[derive(Debug, Clone, Error)]
#[error("polling job '{job}' failed {attempts} consecutive times: {detail}")]
pub struct TransportError {
    /// The job being polled.
    pub job: String,
    /// Number of consecutive failed polls.
    pub attempts: u32,
    /// The last underlying failure.
    pub detail: String,
}

impl TransportError {
    /// Creates a new transport error.
    #[must_use]
    pub fn new(job: impl Into<String>, attempts: u32, detail: impl Into<String>) -> Self {
        Self { job: job.into(), attempts, detail: detail.into() }
    }
}

/// Error raised when a realized stage tree diverges from its expectation.
///
/// Carries every discrepancy found so structural and status divergences are
/// separately reportable.
#[derive(Debug, Clone, Error)]
#[error("stage trace for '{phase}' diverged from the golden expectation ({} discrepancies): {}", discrepancies.len(), format_discrepancies(discrepancies))]
pub struct StageMismatchError {
    /// The verification phase whose trace diverged.
    pub phase: String,
    /// All discrepancies between actual and expected trees.
    pub discrepancies: Vec<Discrepancy>,
}

impl StageMismatchError {
    /// Creates a new stage mismatch error.
    #[must_use]
    pub fn new(phase: impl Into<String>, discrepancies: Vec<Discrepancy>) -> Self {
        Self { phase: phase.into(), discrepancies }
    }
}

fn format_discrepancies(discrepancies: &[Discrepancy]) -> String {
    discrepancies
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error raised when required run attachments are absent.
#[derive(Debug, Clone, Error)]
#[error("run '{run}' is missing required artifacts: {}", missing.join(", "))]
pub struct MissingArtifactError {
    /// The run whose attachments were inspected.
    pub run: String,
    /// Every required artifact name that was not attached.
    pub missing: Vec<String>,
}

impl MissingArtifactError {
    /// Creates a new missing artifact error.
    #[must_use]
    pub fn new(run: impl Into<String>, missing: Vec<String>) -> Self {
        Self { run: run.into(), missing }
    }
}

/// Error raised when a quality scan ran but its gate did not pass.
#[derive(Debug, Clone, Error)]
#[error("quality gate failed for repository '{repo}': {}", failed_conditions.join(", "))]
pub struct QualityGateFailedError {
    /// The scanned repository.
    pub repo: String,
    /// The gate conditions that did not pass.
    pub failed_conditions: Vec<String>,
}

impl QualityGateFailedError {
    /// Creates a new quality gate error.
    #[must_use]
    pub fn new(repo: impl Into<String>, failed_conditions: Vec<String>) -> Self {
        Self { repo: repo.into(), failed_conditions }
    }
}

/// Error raised when no quality scan exists for a repository.
///
/// Distinct from [`QualityGateFailedError`] so callers can tell "never ran"
/// from "ran and failed".
#[derive(Debug, Clone, Error)]
#[error("no quality scan found for repository '{repo}'")]
pub struct ScanNotFoundError {
    /// The repository without a scan.
    pub repo: String,
}

impl ScanNotFoundError {
    /// Creates a new scan-not-found error.
    #[must_use]
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into() }
    }
}

/// Error raised when the executed unit-test count diverges.
#[derive(Debug, Clone, Copy, Error)]
#[error("unit-test count mismatch: expected {expected}, actual {actual}")]
pub struct TestCountMismatchError {
    /// The expected number of executed tests.
    pub expected: u64,
    /// The number of tests the run actually reported.
    pub actual: u64,
}

impl TestCountMismatchError {
    /// Creates a new test count mismatch error.
    #[must_use]
    pub fn new(expected: u64, actual: u64) -> Self {
        Self { expected, actual }
    }
}

/// Error raised when a declared cluster resource is missing or inconsistent.
#[derive(Debug, Clone, Error)]
#[error("{kind} '{name}' in namespace '{namespace}': {detail}")]
pub struct ResourceStateError {
    /// The kind of resource that failed the check.
    pub kind: ResourceKind,
    /// The resource name.
    pub name: String,
    /// The namespace that was queried.
    pub namespace: String,
    /// What was wrong (missing, or the mismatching value).
    pub detail: String,
}

impl ResourceStateError {
    /// Creates a new resource state error.
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        namespace: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
            detail: detail.into(),
        }
    }
}

/// Error raised when a golden fixture cannot be loaded.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture file could not be read.
    #[error("failed to read fixture '{path}': {source}")]
    Io {
        /// The fixture path.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The fixture file is not a valid expectation tree.
    #[error("fixture '{path}' is malformed: {detail}")]
    Malformed {
        /// The fixture path.
        path: String,
        /// The parse failure.
        detail: String,
    },
}

/// Error raised when the harness configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        /// The configuration path.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A configuration line is not a `key=value` pair.
    #[error("malformed configuration line {line} in '{path}': {content}")]
    MalformedLine {
        /// The configuration path.
        path: String,
        /// The 1-based line number.
        line: usize,
        /// The offending line content.
        content: String,
    },

    /// A required configuration key is absent.
    #[error("missing required configuration key '{key}'")]
    MissingKey {
        /// The absent key.
        key: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid value for configuration key '{key}': {value}")]
    InvalidValue {
        /// The key with the bad value.
        key: String,
        /// The offending value.
        value: String,
    },
}

/// Errors from the low-level collaborator clients.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The remote service rejected the request as invalid.
    #[error("remote rejected the request: {reason}")]
    Rejected {
        /// The rejection reason.
        reason: String,
    },

    /// The remote service answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Http {
        /// The response status code.
        status: u16,
        /// The request URL.
        url: String,
    },

    /// The request did not complete at the transport level.
    #[error("transport failure: {detail}")]
    Transport {
        /// The underlying failure.
        detail: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response from {url}: {detail}")]
    Decode {
        /// The request URL.
        url: String,
        /// The decode failure.
        detail: String,
    },
}

impl ClientError {
    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected { reason: reason.into() }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport { detail: detail.into() }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        if err.is_decode() {
            Self::Decode { url, detail: err.to_string() }
        } else if let Some(status) = err.status() {
            Self::Http { status: status.as_u16(), url }
        } else {
            Self::Transport { detail: err.to_string() }
        }
    }
}

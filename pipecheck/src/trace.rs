//! Realized pipeline execution traces.
//!
//! This module contains the types the harness reads back from the remote
//! pipeline engine: run and stage statuses, the recursive stage tree, the
//! opaque run handle, and the unit-test result summary. A stage tree is only
//! ever constructed from a terminal run, so downstream verifiers never
//! observe it mid-update.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a single realized stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    Success,
    /// Stage failed.
    Failure,
    /// Stage completed but was marked unstable (e.g. flaky infrastructure).
    Unstable,
    /// Stage was skipped / not executed.
    Skipped,
    /// Stage was aborted before completing.
    Aborted,
    /// Stage is still running (never present in a terminal tree).
    InProgress,
}

impl StageStatus {
    /// Parses a status label as reported by the CI server.
    #[must_use]
    pub fn from_ci_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Self::Success),
            "FAILED" | "FAILURE" => Some(Self::Failure),
            "UNSTABLE" => Some(Self::Unstable),
            "NOT_EXECUTED" | "SKIPPED" => Some(Self::Skipped),
            "ABORTED" => Some(Self::Aborted),
            "IN_PROGRESS" | "PAUSED_PENDING_INPUT" => Some(Self::InProgress),
            _ => None,
        }
    }

    /// Returns true if the status will not change further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Unstable => write!(f, "unstable"),
            Self::Skipped => write!(f, "skipped"),
            Self::Aborted => write!(f, "aborted"),
            Self::InProgress => write!(f, "in_progress"),
        }
    }
}

/// The status of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted by the engine but not yet started.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failure,
    /// Finished but marked unstable.
    Unstable,
    /// Aborted before finishing.
    Aborted,
}

impl RunStatus {
    /// Returns true if the run has finished and will not change further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Unstable => write!(f, "unstable"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One named, ordered unit of pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNode {
    /// The stage name as declared in the pipeline source.
    pub name: String,
    /// The realized status.
    pub status: StageStatus,
    /// Nested child stages, in execution order.
    #[serde(default)]
    pub children: Vec<StageNode>,
}

impl StageNode {
    /// Creates a leaf stage node.
    #[must_use]
    pub fn new(name: impl Into<String>, status: StageStatus) -> Self {
        Self { name: name.into(), status, children: Vec::new() }
    }

    /// Adds a child stage.
    #[must_use]
    pub fn with_child(mut self, child: StageNode) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of stages in this subtree, including this node.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(StageNode::subtree_len).sum::<usize>()
    }
}

/// The fully realized stage tree of one terminal pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTree {
    /// Root stages in execution order.
    pub stages: Vec<StageNode>,
}

impl StageTree {
    /// Creates a stage tree from root stages.
    #[must_use]
    pub fn new(stages: Vec<StageNode>) -> Self {
        Self { stages }
    }

    /// Total number of stages across the whole tree.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.iter().map(StageNode::subtree_len).sum()
    }

    /// Returns true if the tree has no stages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for StageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(f: &mut fmt::Formatter<'_>, node: &StageNode, depth: usize) -> fmt::Result {
            writeln!(f, "{}{} [{}]", "  ".repeat(depth), node.name, node.status)?;
            for child in &node.children {
                render(f, child, depth + 1)?;
            }
            Ok(())
        }
        for stage in &self.stages {
            render(f, stage, 0)?;
        }
        Ok(())
    }
}

/// Opaque handle identifying one specific pipeline execution.
///
/// Returned by the CI server on trigger and required by downstream phases to
/// fetch attachments and test results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    /// The job that was triggered.
    pub job: String,
    /// The engine-assigned identifier of this execution.
    pub build_id: String,
}

impl RunHandle {
    /// Creates a new run handle.
    #[must_use]
    pub fn new(job: impl Into<String>, build_id: impl Into<String>) -> Self {
        Self { job: job.into(), build_id: build_id.into() }
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.build_id)
    }
}

/// Unit-test results reported by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Total number of executed tests.
    pub total: u64,
    /// Number of failed tests.
    pub failed: u64,
    /// Number of skipped tests.
    pub skipped: u64,
}

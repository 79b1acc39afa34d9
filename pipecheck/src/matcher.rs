//! Golden stage matcher.
//!
//! Pure, deterministic comparison of a realized [`StageTree`] against a
//! golden [`ExpectationTree`]. Execution order is the primary key: the stage
//! at position `i` is compared to the expectation at position `i`; the
//! matcher never reorders or fuzzy-matches by name alone. Structural
//! divergence (extra or missing stages) is reported separately from status
//! divergence.

use crate::errors::StageMismatchError;
use crate::expectation::{ExpectationTree, StageExpectation};
use crate::trace::{StageNode, StageStatus, StageTree};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of divergence found at one position of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// The stage ran but its status is outside the acceptable set.
    StatusMismatch,
    /// An expected stage is absent (or a differently named stage took its
    /// position).
    MissingStage,
    /// The trace contains a stage the expectation does not declare.
    ExtraStage,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusMismatch => write!(f, "status-mismatch"),
            Self::MissingStage => write!(f, "missing-stage"),
            Self::ExtraStage => write!(f, "extra-stage"),
        }
    }
}

/// One divergence between the realized trace and the expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Dot-separated `position:name` chain locating the stage.
    pub path: String,
    /// What kind of divergence this is.
    pub kind: DiscrepancyKind,
    /// The acceptable statuses declared by the expectation (empty for
    /// extra stages).
    pub expected: Vec<StageStatus>,
    /// The realized status, if a stage was present at this position.
    pub actual: Option<StageStatus>,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)?;
        if !self.expected.is_empty() {
            let accepted: Vec<String> = self.expected.iter().map(ToString::to_string).collect();
            write!(f, " (expected one of [{}]", accepted.join(", "))?;
            match self.actual {
                Some(actual) => write!(f, ", actual {actual})")?,
                None => write!(f, ", no stage present)")?,
            }
        } else if let Some(actual) = self.actual {
            write!(f, " (actual {actual})")?;
        }
        Ok(())
    }
}

/// The verdict of one comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Every divergence found, in traversal order.
    pub discrepancies: Vec<Discrepancy>,
}

impl MatchResult {
    /// Returns true if the trace matched the expectation.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Converts the result into `Ok(())` on match or a
    /// [`StageMismatchError`] attributed to `phase` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StageMismatchError`] carrying all discrepancies when the
    /// trees diverged.
    pub fn into_result(self, phase: impl Into<String>) -> Result<(), StageMismatchError> {
        if self.is_match() {
            Ok(())
        } else {
            Err(StageMismatchError::new(phase, self.discrepancies))
        }
    }
}

/// Compares a realized stage tree against a golden expectation tree.
///
/// Pure function: no side effects, identical results on identical inputs.
#[must_use]
pub fn compare(actual: &StageTree, expected: &ExpectationTree) -> MatchResult {
    let mut discrepancies = Vec::new();
    compare_level(&actual.stages, &expected.stages, "", &mut discrepancies);
    MatchResult { discrepancies }
}

fn stage_path(prefix: &str, position: usize, name: &str) -> String {
    if prefix.is_empty() {
        format!("{position}:{name}")
    } else {
        format!("{prefix}.{position}:{name}")
    }
}

fn compare_level(
    actual: &[StageNode],
    expected: &[StageExpectation],
    prefix: &str,
    out: &mut Vec<Discrepancy>,
) {
    for (position, expectation) in expected.iter().enumerate() {
        let path = stage_path(prefix, position, &expectation.name);
        match actual.get(position) {
            None => out.push(Discrepancy {
                path,
                kind: DiscrepancyKind::MissingStage,
                expected: expectation.accept.clone(),
                actual: None,
            }),
            Some(stage) if stage.name != expectation.name => {
                // A renamed stage is a structural divergence, not a status
                // regression; the realized status is still attached for the
                // report.
                out.push(Discrepancy {
                    path,
                    kind: DiscrepancyKind::MissingStage,
                    expected: expectation.accept.clone(),
                    actual: Some(stage.status),
                });
            }
            Some(stage) => {
                if !expectation.accepts(stage.status) {
                    out.push(Discrepancy {
                        path: path.clone(),
                        kind: DiscrepancyKind::StatusMismatch,
                        expected: expectation.accept.clone(),
                        actual: Some(stage.status),
                    });
                }
                compare_level(&stage.children, &expectation.children, &path, out);
            }
        }
    }
    for (position, stage) in actual.iter().enumerate().skip(expected.len()) {
        out.push(Discrepancy {
            path: stage_path(prefix, position, &stage.name),
            kind: DiscrepancyKind::ExtraStage,
            expected: Vec::new(),
            actual: Some(stage.status),
        });
    }
}

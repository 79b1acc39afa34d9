//! Golden expectations: stage expectation trees and cluster resource
//! expectations.
//!
//! Expectations are loaded once per phase from checked-in fixture files and
//! treated as immutable ground truth for that phase.

use crate::errors::FixtureError;
use crate::trace::StageStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The golden counterpart of a realized stage.
///
/// The `accept` set is a superset policy: the realized status must be a
/// member of the set, so a fixture may tolerate infrastructure noise (e.g.
/// `["success", "unstable"]`) per stage. When omitted it defaults to
/// `["success"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExpectation {
    /// The expected stage name (exact match).
    pub name: String,
    /// Acceptable statuses for this stage.
    #[serde(default = "default_accept")]
    pub accept: Vec<StageStatus>,
    /// Expected child stages, in execution order.
    #[serde(default)]
    pub children: Vec<StageExpectation>,
}

fn default_accept() -> Vec<StageStatus> {
    vec![StageStatus::Success]
}

impl StageExpectation {
    /// Creates an expectation accepting only success.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), accept: default_accept(), children: Vec::new() }
    }

    /// Replaces the acceptable status set.
    #[must_use]
    pub fn accepting(mut self, statuses: impl IntoIterator<Item = StageStatus>) -> Self {
        self.accept = statuses.into_iter().collect();
        self
    }

    /// Adds an expected child stage.
    #[must_use]
    pub fn with_child(mut self, child: StageExpectation) -> Self {
        self.children.push(child);
        self
    }

    /// Returns true if the given realized status is acceptable.
    #[must_use]
    pub fn accepts(&self, status: StageStatus) -> bool {
        self.accept.contains(&status)
    }
}

/// The golden stage tree for one verification phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationTree {
    /// Expected root stages in execution order.
    pub stages: Vec<StageExpectation>,
}

impl ExpectationTree {
    /// Creates an expectation tree from root expectations.
    #[must_use]
    pub fn new(stages: Vec<StageExpectation>) -> Self {
        Self { stages }
    }

    /// Loads a golden fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Io`] if the file cannot be read and
    /// [`FixtureError::Malformed`] if it does not parse as an expectation
    /// tree.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|err| FixtureError::Malformed {
            path: path.display().to_string(),
            detail: err.to_string(),
        })
    }
}

/// The kind of cluster resource a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A tagged image within an image stream.
    ImageTag,
    /// A build configuration.
    BuildConfig,
    /// An image stream.
    ImageStream,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageTag => write!(f, "image tag"),
            Self::BuildConfig => write!(f, "build config"),
            Self::ImageStream => write!(f, "image stream"),
        }
    }
}

/// An image tag expected to exist after a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTagExpectation {
    /// The logical image (image stream) name.
    pub name: String,
    /// The exact tag value expected on that stream.
    pub tag: String,
}

/// Declarative description of the cluster objects expected after a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceExpectation {
    /// The namespace all resources must live in.
    pub namespace: String,
    /// Expected image tags per logical name.
    #[serde(default)]
    pub image_tags: Vec<ImageTagExpectation>,
    /// Expected build config names.
    #[serde(default)]
    pub build_configs: Vec<String>,
    /// Expected image stream names.
    #[serde(default)]
    pub image_streams: Vec<String>,
}

/// Derives the image tag for a ref-spec.
///
/// The remote build tags images with the ref-spec normalized by replacing
/// `/` and `-` with `_`.
#[must_use]
pub fn derived_image_tag(ref_spec: &str) -> String {
    ref_spec.replace(['/', '-'], "_")
}

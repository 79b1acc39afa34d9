//! # Pipecheck
//!
//! An end-to-end verification harness for continuous-delivery pipelines.
//!
//! Pipecheck exercises a real CD setup from the outside:
//!
//! - **Run triggering and polling**: Start remote pipeline runs and await
//!   their terminal state under bounded time
//! - **Trace matching**: Compare realized stage trees against golden
//!   expectations, position by position
//! - **Outcome verification**: Quality-gate status, attached artifacts,
//!   executed unit-test counts, and cluster resource state
//! - **Phase orchestration**: Six ordered phases with short-circuit failure
//!   attribution
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipecheck::prelude::*;
//!
//! let fixtures = GoldenFixtures::load("golden")?;
//! let orchestrator = Orchestrator::new(ci, scm, scanner, cluster, fixtures);
//!
//! let spec = ComponentSpec::new("docgen", "PROJ")
//!     .with_repo_base("https://scm.example.com/scm")
//!     .with_expected_unit_tests(14);
//! let verdict = orchestrator.verify(&spec).await;
//! std::process::exit(verdict.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod clients;
pub mod config;
pub mod errors;
pub mod expectation;
pub mod matcher;
pub mod orchestrator;
pub mod poller;
pub mod telemetry;
pub mod trace;
pub mod verify;

#[cfg(test)]
mod scenario_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::clients::{
        BitbucketClient, CiServer, Cluster, JenkinsClient, OpenShiftClient, QualityScanner,
        ScanReport, ScmServer, SonarClient, TriggerRequest,
    };
    pub use crate::config::HarnessConfig;
    pub use crate::errors::HarnessError;
    pub use crate::expectation::{
        derived_image_tag, ExpectationTree, ResourceExpectation, ResourceKind, StageExpectation,
    };
    pub use crate::matcher::{compare, Discrepancy, DiscrepancyKind, MatchResult};
    pub use crate::orchestrator::{
        ComponentSpec, GoldenFixtures, Orchestrator, Verdict, VerificationPhase,
    };
    pub use crate::poller::{PipelineRunPoller, PollerConfig};
    pub use crate::trace::{RunHandle, RunStatus, StageNode, StageStatus, StageTree, TestSummary};
    pub use crate::verify::{
        verify_artifacts, verify_quality, verify_resources, verify_unit_test_count,
    };
}

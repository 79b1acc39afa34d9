//! Pipecheck - end-to-end verification of a continuous-delivery pipeline
//!
//! Triggers provisioning and build runs for each named component, then
//! verifies traces, quality gates, artifacts, unit-test counts, and cluster
//! resources against golden expectations. Exits 0 when every component
//! passes every phase, 1 otherwise.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use pipecheck::clients::{BitbucketClient, JenkinsClient, OpenShiftClient, SonarClient};
use pipecheck::config::HarnessConfig;
use pipecheck::orchestrator::{GoldenFixtures, Orchestrator};
use pipecheck::telemetry::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pipecheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "End-to-end verification harness for CD pipelines", long_about = None)]
struct Cli {
    /// Components to verify, by component id
    #[arg(required = true)]
    components: Vec<String>,

    /// Path to the harness properties file
    #[arg(short, long, default_value = "pipecheck.properties")]
    config: PathBuf,

    /// Directory holding the golden stage fixtures (overrides the config)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,

    /// Git ref to verify (overrides the config)
    #[arg(long)]
    git_ref: Option<String>,

    /// Exact unit-test count each component's build run must report
    #[arg(long, default_value_t = 14)]
    expected_unit_tests: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let mut config = HarnessConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(fixtures_dir) = cli.fixtures_dir {
        config.fixtures_dir = fixtures_dir;
    }
    if let Some(git_ref) = cli.git_ref {
        config.git_ref = git_ref;
    }

    let fixtures = GoldenFixtures::load(&config.fixtures_dir)
        .with_context(|| format!("loading fixtures from {}", config.fixtures_dir.display()))?;

    let ci = Arc::new(JenkinsClient::new(&config.ci_url, &config.ci_user, &config.ci_token));
    let scm = Arc::new(BitbucketClient::new(&config.scm_url, &config.scm_token));
    let scanner = Arc::new(SonarClient::new(&config.quality_url, &config.quality_token));
    let cluster = Arc::new(OpenShiftClient::new(&config.cluster_url, &config.cluster_token));

    let orchestrator = Orchestrator::new(ci, scm, scanner, cluster, fixtures)
        .with_poller_config(config.poller_config());

    let verification_id = Uuid::new_v4();
    let started = Utc::now();
    info!(%verification_id, components = cli.components.len(), "verification started");

    let mut exit_code = 0;
    for component_id in &cli.components {
        let spec = config
            .component_spec(component_id)
            .with_expected_unit_tests(cli.expected_unit_tests);
        let verdict = orchestrator.verify(&spec).await;
        println!("{component_id}: {verdict}");
        exit_code = exit_code.max(verdict.exit_code());
    }

    info!(
        %verification_id,
        elapsed_secs = (Utc::now() - started).num_seconds(),
        exit_code,
        "verification finished"
    );
    std::process::exit(exit_code);
}

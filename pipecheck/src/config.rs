//! Harness configuration.
//!
//! Configuration is read from a properties-style `key=value` file, with
//! `PIPECHECK_*` environment variables taking precedence. Unrecognized keys
//! are retained and passed through verbatim as trigger parameters, so a
//! deployment can feed pipeline-specific settings without code changes.

use crate::errors::ConfigError;
use crate::orchestrator::ComponentSpec;
use crate::poller::PollerConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RECOGNIZED_KEYS: &[&str] = &[
    "ci_url",
    "ci_user",
    "ci_token",
    "scm_url",
    "scm_token",
    "quality_url",
    "quality_token",
    "cluster_url",
    "cluster_token",
    "scm_project",
    "git_ref",
    "repo_base",
    "fixtures_dir",
    "poll_interval_secs",
    "poll_timeout_secs",
];

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Base URL of the CI server.
    pub ci_url: String,
    /// CI server user.
    pub ci_user: String,
    /// CI server API token.
    pub ci_token: String,
    /// Base URL of the SCM server.
    pub scm_url: String,
    /// SCM access token.
    pub scm_token: String,
    /// Base URL of the quality-scan server.
    pub quality_url: String,
    /// Quality-scan access token.
    pub quality_token: String,
    /// Base URL of the cluster API server.
    pub cluster_url: String,
    /// Cluster bearer token.
    pub cluster_token: String,
    /// SCM project of the components under test.
    pub scm_project: String,
    /// Git ref components are built from.
    pub git_ref: String,
    /// Base URL for git clone URLs.
    pub repo_base: String,
    /// Directory holding the golden fixtures.
    pub fixtures_dir: PathBuf,
    /// Poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Poll timeout in seconds.
    pub poll_timeout_secs: u64,
    /// Unrecognized keys, passed through as trigger parameters.
    pub extra: BTreeMap<String, String>,
}

impl HarnessConfig {
    /// Loads configuration from a properties file plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, a line is not a
    /// `key=value` pair, a required key is absent, or a numeric value does
    /// not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut values = BTreeMap::new();
        for (index, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    path: path.display().to_string(),
                    line: index + 1,
                    content: line.to_string(),
                });
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }

        for key in RECOGNIZED_KEYS {
            let env_key = format!("PIPECHECK_{}", key.to_uppercase());
            if let Ok(value) = std::env::var(&env_key) {
                values.insert((*key).to_string(), value);
            }
        }

        Self::from_values(values)
    }

    fn from_values(mut values: BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut require = |key: &str| -> Result<String, ConfigError> {
            values
                .remove(key)
                .ok_or_else(|| ConfigError::MissingKey { key: key.to_string() })
        };

        let ci_url = require("ci_url")?;
        let scm_url = require("scm_url")?;
        let quality_url = require("quality_url")?;
        let cluster_url = require("cluster_url")?;
        let scm_project = require("scm_project")?;
        let repo_base = require("repo_base")?;

        let mut optional = |key: &str| values.remove(key).unwrap_or_default();
        let ci_user = optional("ci_user");
        let ci_token = optional("ci_token");
        let scm_token = optional("scm_token");
        let quality_token = optional("quality_token");
        let cluster_token = optional("cluster_token");
        let git_ref = values.remove("git_ref").unwrap_or_else(|| "master".to_string());
        let fixtures_dir = PathBuf::from(
            values.remove("fixtures_dir").unwrap_or_else(|| "golden".to_string()),
        );
        let poll_interval_secs = parse_secs(&mut values, "poll_interval_secs", 10)?;
        let poll_timeout_secs = parse_secs(&mut values, "poll_timeout_secs", 30 * 60)?;

        Ok(Self {
            ci_url,
            ci_user,
            ci_token,
            scm_url,
            scm_token,
            quality_url,
            quality_token,
            cluster_url,
            cluster_token,
            scm_project,
            git_ref,
            repo_base,
            fixtures_dir,
            poll_interval_secs,
            poll_timeout_secs,
            extra: values,
        })
    }

    /// The poller configuration derived from this config.
    #[must_use]
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::new()
            .with_interval(Duration::from_secs(self.poll_interval_secs))
            .with_timeout(Duration::from_secs(self.poll_timeout_secs))
    }

    /// Builds the spec of one component-under-test from this config.
    #[must_use]
    pub fn component_spec(&self, component_id: &str) -> ComponentSpec {
        let mut spec = ComponentSpec::new(component_id, &self.scm_project)
            .with_ref_spec(&self.git_ref)
            .with_repo_base(&self.repo_base);
        for (key, value) in &self.extra {
            spec = spec.with_parameter(key, value);
        }
        spec
    }
}

fn parse_secs(
    values: &mut BTreeMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match values.remove(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

//! SonarQube-backed implementation of the quality-scan interface.

use super::{GateCondition, QualityScanner, ScanReport};
use crate::errors::ClientError;
use async_trait::async_trait;
use serde::Deserialize;

/// HTTP client for the quality-scan server.
#[derive(Debug, Clone)]
pub struct SonarClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl SonarClient {
    /// Creates a new client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl QualityScanner for SonarClient {
    async fn latest_scan(&self, repo_name: &str) -> Result<Option<ScanReport>, ClientError> {
        let url = format!(
            "{}/api/qualitygates/project_status?projectKey={repo_name}",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.token, Option::<&str>::None)
            .send()
            .await?;

        // The scanner answers 404 for repositories it has never analyzed;
        // that is "no scan", not a transport fault.
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let status: ProjectStatusResponse =
            response.error_for_status()?.json().await?;
        Ok(Some(report_from(status)))
    }
}

#[derive(Debug, Deserialize)]
struct ProjectStatusResponse {
    #[serde(rename = "projectStatus")]
    project_status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
struct ProjectStatus {
    status: String,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "metricKey")]
    metric_key: String,
    status: String,
}

fn report_from(response: ProjectStatusResponse) -> ScanReport {
    ScanReport {
        gate_passed: response.project_status.status.eq_ignore_ascii_case("ok"),
        conditions: response
            .project_status
            .conditions
            .into_iter()
            .map(|c| GateCondition { metric: c.metric_key, status: c.status })
            .collect(),
    }
}

//! Jenkins-backed implementation of the CI server interface.
//!
//! Triggering goes through `buildWithParameters`; the queue item returned in
//! the `Location` header is polled briefly until the engine assigns a build
//! number. Stage traces come from the workflow `wfapi/describe` endpoint,
//! unit-test summaries from the `testReport` endpoint.

use super::{CiServer, TriggerRequest};
use crate::errors::ClientError;
use crate::trace::{RunHandle, RunStatus, StageNode, StageStatus, StageTree, TestSummary};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Tries for the queued run to be assigned a build number.
const QUEUE_POLL_ATTEMPTS: u32 = 30;
const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// HTTP client for the CI server's trigger/status/artifact API.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    api_token: String,
}

impl JenkinsClient {
    /// Creates a new client against the given base URL.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            api_token: api_token.into(),
        }
    }

    fn job_url(&self, job: &str) -> String {
        format!("{}/job/{job}", self.base_url)
    }

    fn build_url(&self, run: &RunHandle) -> String {
        format!("{}/{}", self.job_url(&run.job), run.build_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.user, Some(&self.api_token))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn await_queued_build(&self, job: &str, queue_url: &str) -> Result<RunHandle, ClientError> {
        let item_url = format!("{}/api/json", queue_url.trim_end_matches('/'));
        for _ in 0..QUEUE_POLL_ATTEMPTS {
            let item: QueueItem = self.get_json(&item_url).await?;
            if item.cancelled.unwrap_or(false) {
                return Err(ClientError::rejected(format!(
                    "queued run of job '{job}' was cancelled by the engine"
                )));
            }
            if let Some(executable) = item.executable {
                return Ok(RunHandle::new(job, executable.number.to_string()));
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
        }
        Err(ClientError::transport(format!(
            "queued run of job '{job}' was never assigned a build number"
        )))
    }
}

#[async_trait]
impl CiServer for JenkinsClient {
    async fn trigger(&self, request: &TriggerRequest) -> Result<RunHandle, ClientError> {
        let url = format!("{}/buildWithParameters", self.job_url(&request.job_name));
        let mut form: Vec<(String, String)> = vec![
            ("scmProject".to_string(), request.scm_project.clone()),
            ("refSpec".to_string(), request.ref_spec.clone()),
            ("pipelineOwner".to_string(), request.pipeline_owner.clone()),
            ("pipelinePath".to_string(), request.pipeline_path.clone()),
            ("targetProject".to_string(), request.target_project.clone()),
        ];
        form.extend(request.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.api_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ClientError::rejected(format!(
                "job '{}' answered {status}",
                request.job_name
            )));
        }
        let response = response.error_for_status()?;

        let queue_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| {
                ClientError::rejected(format!(
                    "job '{}' accepted the trigger without a queue location",
                    request.job_name
                ))
            })?;

        debug!(job = %request.job_name, queue = %queue_url, "trigger accepted, awaiting build number");
        self.await_queued_build(&request.job_name, &queue_url).await
    }

    async fn run_status(&self, run: &RunHandle) -> Result<RunStatus, ClientError> {
        let url = format!("{}/api/json?tree=building,result", self.build_url(run));
        let info: BuildInfo = self.get_json(&url).await?;
        run_status_from(&info, run)
    }

    async fn stage_tree(&self, run: &RunHandle) -> Result<StageTree, ClientError> {
        let url = format!("{}/wfapi/describe", self.build_url(run));
        let described: WfRun = self.get_json(&url).await?;
        tree_from_wf(described, &url)
    }

    async fn attachments(&self, run: &RunHandle) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/api/json?tree=artifacts[fileName]", self.build_url(run));
        let listing: ArtifactListing = self.get_json(&url).await?;
        Ok(listing.artifacts.into_iter().map(|a| a.file_name).collect())
    }

    async fn test_summary(&self, run: &RunHandle) -> Result<TestSummary, ClientError> {
        let url = format!(
            "{}/testReport/api/json?tree=totalCount,failCount,skipCount",
            self.build_url(run)
        );
        let report: TestReport = self.get_json(&url).await?;
        Ok(TestSummary {
            total: report.total_count,
            failed: report.fail_count,
            skipped: report.skip_count,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueueItem {
    cancelled: Option<bool>,
    executable: Option<QueueExecutable>,
}

#[derive(Debug, Deserialize)]
struct QueueExecutable {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct BuildInfo {
    building: bool,
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WfRun {
    #[serde(default)]
    stages: Vec<WfStage>,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(default)]
    artifacts: Vec<ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    #[serde(rename = "fileName")]
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct TestReport {
    #[serde(rename = "totalCount", default)]
    total_count: u64,
    #[serde(rename = "failCount", default)]
    fail_count: u64,
    #[serde(rename = "skipCount", default)]
    skip_count: u64,
}

#[derive(Debug, Deserialize)]
struct WfStage {
    name: String,
    status: String,
    #[serde(rename = "stageFlowNodes", default)]
    stage_flow_nodes: Vec<WfStage>,
}

fn run_status_from(info: &BuildInfo, run: &RunHandle) -> Result<RunStatus, ClientError> {
    if info.building {
        return Ok(RunStatus::Running);
    }
    match info.result.as_deref() {
        None => Ok(RunStatus::Running),
        Some("SUCCESS") => Ok(RunStatus::Success),
        Some("FAILURE") => Ok(RunStatus::Failure),
        Some("UNSTABLE") => Ok(RunStatus::Unstable),
        Some("ABORTED") | Some("NOT_BUILT") => Ok(RunStatus::Aborted),
        Some(other) => Err(ClientError::Decode {
            url: run.to_string(),
            detail: format!("unknown run result '{other}'"),
        }),
    }
}

fn tree_from_wf(run: WfRun, url: &str) -> Result<StageTree, ClientError> {
    fn node_from(stage: WfStage, url: &str) -> Result<StageNode, ClientError> {
        let status = StageStatus::from_ci_label(&stage.status).ok_or_else(|| {
            ClientError::Decode {
                url: url.to_string(),
                detail: format!("unknown stage status '{}' on stage '{}'", stage.status, stage.name),
            }
        })?;
        let mut node = StageNode::new(stage.name, status);
        for child in stage.stage_flow_nodes {
            node.children.push(node_from(child, url)?);
        }
        Ok(node)
    }

    let stages = run
        .stages
        .into_iter()
        .map(|s| node_from(s, url))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StageTree::new(stages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_from_wf_describe_payload() {
        let raw = r#"{
            "stages": [
                {"name": "Checkout", "status": "SUCCESS"},
                {"name": "Build", "status": "UNSTABLE", "stageFlowNodes": [
                    {"name": "Compile", "status": "SUCCESS"},
                    {"name": "Lint", "status": "UNSTABLE"}
                ]}
            ]
        }"#;
        let described: WfRun = serde_json::from_str(raw).unwrap();
        let tree = tree_from_wf(described, "wfapi/describe").unwrap();

        assert_eq!(tree.stage_count(), 4);
        assert_eq!(tree.stages[0].name, "Checkout");
        assert_eq!(tree.stages[1].children[1].status, StageStatus::Unstable);
    }

    #[test]
    fn test_tree_from_wf_rejects_unknown_status() {
        let described: WfRun = serde_json::from_str(
            r#"{"stages": [{"name": "Weird", "status": "HALF_DONE"}]}"#,
        )
        .unwrap();
        let err = tree_from_wf(described, "wfapi/describe").unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn test_run_status_mapping() {
        let run = RunHandle::new("unitt-docgen", "3");
        let building = BuildInfo { building: true, result: None };
        assert_eq!(run_status_from(&building, &run).unwrap(), RunStatus::Running);

        let pending = BuildInfo { building: false, result: None };
        assert_eq!(run_status_from(&pending, &run).unwrap(), RunStatus::Running);

        let done = BuildInfo { building: false, result: Some("SUCCESS".to_string()) };
        assert_eq!(run_status_from(&done, &run).unwrap(), RunStatus::Success);

        let aborted = BuildInfo { building: false, result: Some("ABORTED".to_string()) };
        assert_eq!(run_status_from(&aborted, &run).unwrap(), RunStatus::Aborted);
    }

    #[test]
    fn test_artifact_listing_parse() {
        let raw = r#"{"artifacts": [{"fileName": "SCRR-x.docx"}, {"fileName": "SCRR-x.md"}]}"#;
        let listing: ArtifactListing = serde_json::from_str(raw).unwrap();
        let names: Vec<String> = listing.artifacts.into_iter().map(|a| a.file_name).collect();
        assert_eq!(names, vec!["SCRR-x.docx".to_string(), "SCRR-x.md".to_string()]);
    }

    #[test]
    fn test_test_report_parse() {
        let raw = r#"{"totalCount": 14, "failCount": 1, "skipCount": 2}"#;
        let report: TestReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.total_count, 14);
        assert_eq!(report.fail_count, 1);
        assert_eq!(report.skip_count, 2);
    }
}

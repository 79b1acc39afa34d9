//! Bitbucket-backed implementation of the SCM provisioning interface.

use super::ScmServer;
use crate::errors::ClientError;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// HTTP client for the SCM project/repository provisioning API.
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BitbucketClient {
    /// Creates a new client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn repos_url(&self, project: &str) -> String {
        format!("{}/rest/api/1.0/projects/{project}/repos", self.base_url)
    }
}

#[async_trait]
impl ScmServer for BitbucketClient {
    async fn recreate_project_repo(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<(), ClientError> {
        // A leftover repository from an earlier run is expected; 404 means
        // there was nothing to clean.
        let delete_url = format!("{}/{repository}", self.repos_url(project));
        let response = self
            .http
            .delete(&delete_url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ClientError::Http {
                status: response.status().as_u16(),
                url: delete_url,
            });
        }
        debug!(project, repository, "cleaned up existing repository");

        let create_url = self.repos_url(project);
        let response = self
            .http
            .post(&create_url)
            .bearer_auth(&self.token)
            .json(&json!({ "name": repository, "scmId": "git" }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Http {
                status: response.status().as_u16(),
                url: create_url,
            });
        }
        debug!(project, repository, "created fresh repository");
        Ok(())
    }
}

//! Cluster control-plane implementation of the resource query interface.

use super::Cluster;
use crate::errors::ClientError;
use async_trait::async_trait;
use serde::Deserialize;

/// HTTP client for the cluster's image-stream and build-config APIs.
#[derive(Debug, Clone)]
pub struct OpenShiftClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl OpenShiftClient {
    /// Creates a new client against the given API server URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn exists(&self, url: String) -> Result<bool, ClientError> {
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(ClientError::Http { status, url }),
        }
    }

    fn image_stream_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/apis/image.openshift.io/v1/namespaces/{namespace}/imagestreams/{name}",
            self.base_url
        )
    }
}

#[async_trait]
impl Cluster for OpenShiftClient {
    async fn image_stream_exists(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ClientError> {
        self.exists(self.image_stream_url(namespace, name)).await
    }

    async fn build_config_exists(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ClientError> {
        let url = format!(
            "{}/apis/build.openshift.io/v1/namespaces/{namespace}/buildconfigs/{name}",
            self.base_url
        );
        self.exists(url).await
    }

    async fn image_stream_tags(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>, ClientError> {
        let url = self.image_stream_url(namespace, name);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let stream: ImageStream = response.error_for_status()?.json().await?;
        Ok(stream
            .status
            .tags
            .into_iter()
            .map(|t| t.tag)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ImageStream {
    #[serde(default)]
    status: ImageStreamStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ImageStreamStatus {
    #[serde(default)]
    tags: Vec<NamedTag>,
}

#[derive(Debug, Deserialize)]
struct NamedTag {
    tag: String,
}

use reqwest::header::AUTHORIZATION;
use scalabel_core::{TaskKey, TaskMetadata};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("metadata endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed task metadata: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),
}

/// Source of per-task metadata. One call per task; the caller merges the result.
pub trait MetadataFetcher: Send + Sync {
    fn fetch(
        &self,
        project_name: &str,
        key: &TaskKey,
    ) -> impl Future<Output = Result<TaskMetadata, FetchError>> + Send;
}

/// Supplies the value of the `Authorization` header, if any.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<String>;
}

pub struct NoCredential;

impl CredentialSource for NoCredential {
    fn credential(&self) -> Option<String> {
        None
    }
}

pub struct StaticCredential(pub String);

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the credential from an environment variable on every request.
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn credential(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

pub fn request_url(endpoint: &Url, project_name: &str, key: &TaskKey) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("project_name", project_name)
        .append_pair("task_id", key.normalized());
    url
}

pub struct HttpMetadataFetcher {
    endpoint: Url,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpMetadataFetcher {
    pub fn new(endpoint: Url, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            credentials,
        }
    }

}

impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, project_name: &str, key: &TaskKey) -> Result<TaskMetadata, FetchError> {
        if project_name.trim().is_empty() {
            return Err(FetchError::InvalidRequest(
                "project name must not be empty".to_string(),
            ));
        }
        let url = request_url(&self.endpoint, project_name, key);
        debug!(event = "task_metadata_request", key = key.as_str(), url = %url);

        let mut request = self.client.get(url);
        if let Some(credential) = self.credentials.credential() {
            request = request.header(AUTHORIZATION, credential);
        }
        let response = request
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

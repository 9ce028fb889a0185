//! HTTP side of the generation server API
//!
//! Liveness probe, job submission and asset upload.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AssetHandle, CorrelationId, JobId};
use crate::workflow::WorkflowGraph;
use crate::{Result, VidBenchError};

/// Deadline for the liveness probe
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a WorkflowGraph,
    client_id: CorrelationId,
}

#[derive(Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    name: String,
}

/// Client for one generation server
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: Client,
    server: String,
}

impl EngineClient {
    /// Create a client for the server at `server` (http or https base URL)
    pub fn new(server: &str) -> Result<Self> {
        let parsed = url::Url::parse(server).map_err(|e| {
            VidBenchError::ConfigError(format!("Invalid server URL '{}': {}", server, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(VidBenchError::ConfigError(format!(
                "Server URL must use http or https: {}",
                server
            )));
        }

        Ok(Self {
            http: Client::new(),
            server: server.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash
    pub fn server(&self) -> &str {
        &self.server
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server, path.trim_start_matches('/'))
    }

    /// Check the server answers `/system_stats`
    pub async fn check_liveness(&self) -> Result<()> {
        let response = self
            .http
            .get(self.endpoint("system_stats"))
            .timeout(LIVENESS_TIMEOUT)
            .send()
            .await
            .map_err(|e| VidBenchError::ConnectivityError(format!("{}: {}", self.server, e)))?;

        if !response.status().is_success() {
            return Err(VidBenchError::ConnectivityError(format!(
                "{} answered liveness probe with {}",
                self.server,
                response.status()
            )));
        }

        Ok(())
    }

    /// Queue `graph` under a freshly minted correlation id
    pub async fn submit(&self, graph: &WorkflowGraph) -> Result<(JobId, CorrelationId)> {
        graph.validate()?;

        let correlation_id = CorrelationId::new();
        let response = self
            .http
            .post(self.endpoint("prompt"))
            .json(&SubmitRequest {
                prompt: graph,
                client_id: correlation_id,
            })
            .send()
            .await?;

        let response = reject_on_failure(response, VidBenchError::SubmissionRejected).await?;
        let body: SubmitResponse = response.json().await.map_err(|e| {
            VidBenchError::ProtocolError(format!("Submission response has no prompt_id: {}", e))
        })?;

        let job_id = JobId(body.prompt_id);
        debug!(job_id = %job_id, correlation_id = %correlation_id, nodes = graph.len(), "job queued");
        Ok((job_id, correlation_id))
    }

    /// Upload PNG bytes as `file_name` and return the server's asset name
    pub async fn upload_asset(&self, file_name: &str, bytes: Vec<u8>) -> Result<AssetHandle> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")?;
        let form = Form::new().part("image", part);

        let response = self
            .http
            .post(self.endpoint("upload/image"))
            .multipart(form)
            .send()
            .await?;

        let response = reject_on_failure(response, VidBenchError::AssetUnavailable).await?;
        let body: UploadResponse = response.json().await.map_err(|e| {
            VidBenchError::ProtocolError(format!("Upload response has no name: {}", e))
        })?;

        debug!(asset = %body.name, "asset uploaded");
        Ok(AssetHandle(body.name))
    }
}

/// Turn a non-success response into `make_err`, carrying the server's body text
async fn reject_on_failure(
    response: Response,
    make_err: fn(String) -> VidBenchError,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };
    Err(make_err(detail))
}

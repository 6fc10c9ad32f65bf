//! Cluster gateway backend
//!
//! Submits rendered scripts to a compute cluster through its HTTP gateway
//! and polls the reported state until the remote work finishes. The
//! gateway owns resource allocation; this client only submits and polls.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BackendError, ExecutionBackend, LaunchSpec, RunHandle, RunOutcome};

/// Backend that hands scripts to a cluster gateway
#[derive(Debug, Clone)]
pub struct GatewayBackend {
    base_url: String,
    client: Client,
}

impl GatewayBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_error(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        BackendError::BadStatus { status, message }
    }
}

#[async_trait]
impl ExecutionBackend for GatewayBackend {
    async fn submit(&self, spec: LaunchSpec) -> Result<Box<dyn RunHandle>, BackendError> {
        let url = format!("{}/api/runs", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitRequest {
                run_id: spec.run_id,
                script: spec.script,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let submitted: SubmitResponse = response.json().await?;

        Ok(Box::new(GatewayHandle {
            client: self.client.clone(),
            state_url: format!("{}/api/runs/{}/state", self.base_url, submitted.id),
        }))
    }
}

/// Handle over work executing behind the gateway
struct GatewayHandle {
    client: Client,
    state_url: String,
}

impl GatewayHandle {
    async fn state(&self) -> Result<GatewayState, BackendError> {
        let response = self.client.get(&self.state_url).send().await?;

        if !response.status().is_success() {
            return Err(GatewayBackend::read_error(response).await);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RunHandle for GatewayHandle {
    async fn is_finished(&self) -> Result<bool, BackendError> {
        Ok(self.state().await?.finished)
    }

    async fn is_failed(&self) -> Result<bool, BackendError> {
        let state = self.state().await?;
        Ok(state.finished && state.failed)
    }

    async fn is_successful(&self) -> Result<bool, BackendError> {
        let state = self.state().await?;
        Ok(state.finished && !state.failed)
    }

    async fn outcome(&self) -> Result<RunOutcome, BackendError> {
        let state = self.state().await?;
        if !state.finished {
            return Err(BackendError::NotFinished);
        }

        Ok(RunOutcome {
            success: !state.failed,
            exit_code: state.exit_code,
            stdout: state.stdout.unwrap_or_default(),
            stderr: state.stderr.unwrap_or_default(),
            message: state.message,
        })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SubmitRequest {
    run_id: Uuid,
    script: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayState {
    finished: bool,
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

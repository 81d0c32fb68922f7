//! REST client for the WaveSpeed HTTP endpoints.
//!
//! Wraps job submission (`POST /predictions`) and status polling
//! (`GET /predictions/{id}/result`) using [`reqwest`].

use async_trait::async_trait;
use serde_json::json;

use crate::types::{extract_job_id, extract_outputs, extract_status, JobPoll, JobStatus};
use crate::{GenerationService, SubmitJobRequest};

/// HTTP client for the WaveSpeed generation API.
pub struct WaveSpeedClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Errors from the WaveSpeed REST layer.
#[derive(Debug, thiserror::Error)]
pub enum WaveSpeedError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// WaveSpeed returned a non-2xx status code.
    #[error("WaveSpeed API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response arrived without a recognizable job id.
    #[error("WaveSpeed response carried no job id")]
    MissingJobId,
}

impl WaveSpeedError {
    /// True for failures worth retrying on their own merits (transport
    /// errors and 5xx). The retry wrapper currently retries everything
    /// uniformly regardless; this exists for callers that want to log
    /// the distinction.
    pub fn is_transient(&self) -> bool {
        match self {
            WaveSpeedError::Request(_) => true,
            WaveSpeedError::Api { status, .. } => *status >= 500,
            WaveSpeedError::MissingJobId => false,
        }
    }
}

impl WaveSpeedClient {
    /// Create a new client.
    ///
    /// * `api_url` - Base URL, e.g. `https://api.wavespeed.ai/api/v3`.
    /// * `api_key` - Bearer token.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (connection pooling across collaborators).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code; otherwise map it
    /// to [`WaveSpeedError::Api`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, WaveSpeedError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "WaveSpeed returned an error response");
            return Err(WaveSpeedError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response body as JSON.
    async fn parse_json(response: reqwest::Response) -> Result<serde_json::Value, WaveSpeedError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[async_trait]
impl GenerationService for WaveSpeedClient {
    /// Submit one generation sub-job.
    ///
    /// Sends `POST /predictions` with the prompt, encoded images,
    /// dimensions, and the webhook callback. Returns the job id found
    /// in the response (top level or nested under `data`).
    async fn submit(&self, request: &SubmitJobRequest) -> Result<String, WaveSpeedError> {
        let body = json!({
            "prompt": request.prompt,
            "images": request.images,
            "size": format!("{}*{}", request.width, request.height),
            "enable_sync_mode": false,
            "webhook": request.webhook_url,
        });

        let response = self
            .client
            .post(format!("{}/predictions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let body = Self::parse_json(response).await?;
        extract_job_id(&body).ok_or(WaveSpeedError::MissingJobId)
    }

    /// Poll the current state of a job.
    ///
    /// Sends `GET /predictions/{id}/result`. A response without a
    /// recognizable status maps to [`JobStatus::Other`], which callers
    /// treat as "still pending".
    async fn get_job(&self, job_id: &str) -> Result<JobPoll, WaveSpeedError> {
        let response = self
            .client
            .get(format!("{}/predictions/{}/result", self.api_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body = Self::parse_json(response).await?;
        Ok(JobPoll {
            status: extract_status(&body).unwrap_or(JobStatus::Other),
            outputs: extract_outputs(&body),
        })
    }
}

//! Client for the WaveSpeed image-generation API.
//!
//! The service accepts a generation request and runs it asynchronously:
//! [`GenerationService::submit`] returns an opaque job id, and the
//! outcome is observed later either by polling
//! [`GenerationService::get_job`] or through the webhook WaveSpeed
//! posts to the callback URL supplied at submission.

pub mod client;
pub mod types;

pub use client::{WaveSpeedClient, WaveSpeedError};
pub use types::{JobPoll, JobStatus, SubmitJobRequest};

use async_trait::async_trait;

/// Remote generation-service contract.
///
/// The pipeline crate works against this trait so tests can substitute
/// a scripted fake for the real [`WaveSpeedClient`].
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit one sub-job; returns the remote job id.
    async fn submit(&self, request: &SubmitJobRequest) -> Result<String, WaveSpeedError>;

    /// Query the current status and outputs of a previously submitted job.
    async fn get_job(&self, job_id: &str) -> Result<JobPoll, WaveSpeedError>;
}

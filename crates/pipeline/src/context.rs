//! Shared collaborators and tunables for the pipeline.

use std::sync::Arc;
use std::time::Duration;

use wavebatch_core::retry::RetryPolicy;
use wavebatch_store::RecordStore;
use wavebatch_wavespeed::GenerationService;

/// Everything the orchestrator, reconciler, and sweep need. Cheaply
/// cloneable; collaborators sit behind `Arc` trait objects so tests
/// can swap in fakes.
#[derive(Clone)]
pub struct PipelineContext {
    /// Batch record store.
    pub store: Arc<dyn RecordStore>,
    /// Remote generation service.
    pub generator: Arc<dyn GenerationService>,
    /// Plain HTTP client for fetching user-supplied image URLs.
    pub http: reqwest::Client,
    /// Callback address handed to the generation service at submission.
    pub webhook_url: String,
    /// Minimum spacing between successive sub-job submissions.
    pub submit_spacing: Duration,
    /// Per-batch timeout window; pending sub-jobs past this are
    /// force-failed by the sweep.
    pub batch_timeout: chrono::Duration,
    /// Retry budget for sub-job submission calls.
    pub submit_retry: RetryPolicy,
    /// Retry budget for sweep status polls.
    pub poll_retry: RetryPolicy,
}

//! Handler for `POST /generate-batch`.

use axum::extract::State;
use axum::Form;
use serde::Deserialize;

use wavebatch_core::error::CoreError;
use wavebatch_pipeline::{submit_batch, BatchRequest};

use crate::error::AppResult;
use crate::state::AppState;

/// URL-encoded body of a batch submission (field names match the
/// `/app` form).
#[derive(Debug, Deserialize)]
pub struct GenerateBatchForm {
    /// Generation prompt.
    pub prompt: String,
    /// Subject image URL.
    #[serde(rename = "subjectUrl")]
    pub subject_url: String,
    /// Comma-separated reference image URLs, optional.
    #[serde(rename = "refUrls", default)]
    pub ref_urls: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Requested sub-job count; clamped to the allowed range.
    pub count: u32,
}

/// POST /generate-batch
///
/// Runs the submission orchestrator. Returns 200 with a human-readable
/// confirmation including the batch record id, or 500 with a JSON error
/// body when submission fails.
pub async fn generate_batch(
    State(state): State<AppState>,
    Form(form): Form<GenerateBatchForm>,
) -> AppResult<String> {
    if form.prompt.trim().is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".into()).into());
    }
    if form.subject_url.trim().is_empty() {
        return Err(CoreError::Validation("subjectUrl must not be empty".into()).into());
    }
    if form.width == 0 || form.height == 0 {
        return Err(CoreError::Validation("width and height must be positive".into()).into());
    }

    let reference_urls: Vec<String> = form
        .ref_urls
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    let request = BatchRequest {
        prompt: form.prompt.trim().to_string(),
        subject_url: form.subject_url.trim().to_string(),
        reference_urls,
        width: form.width,
        height: form.height,
        count: form.count,
    };

    let submitted = submit_batch(&state.pipeline, &request).await?;

    tracing::info!(
        record_id = %submitted.record_id,
        sub_jobs = submitted.request_ids.len(),
        "Batch accepted"
    );

    Ok(format!(
        "Batch {} submitted with {} sub-job(s). Results will accumulate on the record as they complete.",
        submitted.record_id,
        submitted.request_ids.len(),
    ))
}

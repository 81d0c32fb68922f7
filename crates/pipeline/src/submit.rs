//! Job Submission Orchestrator.
//!
//! Creates the batch record, submits N sub-jobs at a fixed minimum
//! spacing, and persists the collected job ids. There is no rollback on
//! partial failure: ids submitted before an error stay submitted, the
//! ids collected so far are persisted, and the error surfaces to the
//! caller.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;

use wavebatch_core::batch::clamp_batch_count;
use wavebatch_core::retry::retry_with_backoff;
use wavebatch_store::BatchPatch;
use wavebatch_wavespeed::SubmitJobRequest;

use crate::context::PipelineContext;
use crate::error::PipelineError;

/// One user-submitted batch request.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Generation prompt.
    pub prompt: String,
    /// Subject image URL.
    pub subject_url: String,
    /// Additional reference image URLs.
    pub reference_urls: Vec<String>,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Requested sub-job count; clamped to the allowed range.
    pub count: u32,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    /// Store-assigned batch record id.
    pub record_id: String,
    /// Ids of the submitted sub-jobs, in submission order.
    pub request_ids: Vec<String>,
}

/// Fetch an image URL and encode it as a base64 data URI.
async fn fetch_image_data_uri(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, PipelineError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::ImageFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::ImageFetch {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::ImageFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    Ok(format!(
        "data:{content_type};base64,{}",
        BASE64.encode(&bytes)
    ))
}

/// Create a batch record and submit its sub-jobs.
///
/// Sub-jobs are submitted sequentially with `submit_spacing` between
/// them to respect remote throughput limits; each submission goes
/// through the retry wrapper. If a submission still fails after
/// retries, the ids collected so far are persisted before the error
/// propagates, so the record honestly reflects what was submitted.
pub async fn submit_batch(
    ctx: &PipelineContext,
    request: &BatchRequest,
) -> Result<SubmittedBatch, PipelineError> {
    let count = clamp_batch_count(request.count);

    // Encode the subject first, then references, preserving order.
    let mut images = Vec::with_capacity(1 + request.reference_urls.len());
    images.push(fetch_image_data_uri(&ctx.http, &request.subject_url).await?);
    for url in &request.reference_urls {
        images.push(fetch_image_data_uri(&ctx.http, url).await?);
    }

    let record = ctx.store.create(&request.prompt).await?;
    tracing::info!(record_id = %record.id, count, "Batch record created, submitting sub-jobs");

    let submit_request = SubmitJobRequest {
        prompt: request.prompt.clone(),
        images,
        width: request.width,
        height: request.height,
        webhook_url: ctx.webhook_url.clone(),
    };

    let mut request_ids: Vec<String> = Vec::with_capacity(count as usize);
    let mut submit_error: Option<PipelineError> = None;

    for index in 0..count {
        if index > 0 {
            tokio::time::sleep(ctx.submit_spacing).await;
        }

        let result = retry_with_backoff(ctx.submit_retry, "wavespeed submit", || {
            ctx.generator.submit(&submit_request)
        })
        .await;

        match result {
            Ok(job_id) => {
                tracing::debug!(record_id = %record.id, index, job_id = %job_id, "Sub-job submitted");
                request_ids.push(job_id);
            }
            Err(err) => {
                tracing::error!(record_id = %record.id, index, error = %err, "Sub-job submission failed");
                submit_error = Some(err.into());
                break;
            }
        }
    }

    ctx.store
        .update(
            &record.id,
            BatchPatch {
                request_ids: Some(request_ids.clone()),
                last_update: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

    if let Some(err) = submit_error {
        return Err(err);
    }

    tracing::info!(record_id = %record.id, submitted = request_ids.len(), "Batch submission complete");
    Ok(SubmittedBatch {
        record_id: record.id,
        request_ids,
    })
}

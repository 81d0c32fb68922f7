//! Pipeline error type.

use wavebatch_core::retry::ExhaustedRetries;
use wavebatch_store::StoreError;
use wavebatch_wavespeed::WaveSpeedError;

/// Failures on the submission and reconciliation paths.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Record-store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Generation-service call failed without retry wrapping.
    #[error(transparent)]
    Generation(#[from] WaveSpeedError),

    /// Generation-service call failed after the retry budget.
    #[error(transparent)]
    GenerationExhausted(#[from] ExhaustedRetries<WaveSpeedError>),

    /// A user-supplied image URL could not be fetched.
    #[error("failed to fetch image {url}: {reason}")]
    ImageFetch {
        /// The URL that failed.
        url: String,
        /// Transport error or HTTP status description.
        reason: String,
    },
}

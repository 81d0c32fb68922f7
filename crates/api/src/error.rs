use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use wavebatch_core::error::CoreError;
use wavebatch_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain and pipeline errors and implements [`IntoResponse`] to
/// produce consistent `{"error", "code"}` JSON bodies. Webhook handlers
/// deliberately do NOT return this type; they swallow errors and
/// acknowledge 200 so the remote sender does not retry-storm.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level validation or internal error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A submission-path failure from the pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }

            // Submission failures surface synchronously to the caller
            // with the underlying message (image fetch, remote
            // rejection, retries exhausted, store failure).
            AppError::Pipeline(err) => {
                tracing::error!(error = %err, "Batch submission failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SUBMISSION_FAILED",
                    err.to_string(),
                )
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

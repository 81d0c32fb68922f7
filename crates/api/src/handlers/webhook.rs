//! Handler for the WaveSpeed completion webhook.
//!
//! WaveSpeed delivers at-least-once with loose payload shapes, so this
//! endpoint is maximally forgiving: payloads are parsed into a typed
//! event, unrecognized shapes and unknown job ids are acknowledged as
//! no-ops, and internal failures are logged but still acknowledged.
//! Returning anything but 200 would only trigger a retry storm for an
//! event the sweep will pick up anyway.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use wavebatch_core::batch::JobOutcome;
use wavebatch_pipeline::{finalize_if_done, reconcile};
use wavebatch_wavespeed::types::{extract_job_id, extract_outputs, extract_status};
use wavebatch_wavespeed::JobStatus;

use crate::state::AppState;

/// A webhook payload parsed down to the one fact it carries: which
/// sub-job finished, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// The sub-job the event is about.
    pub job_id: String,
    /// Terminal outcome reported by the sender.
    pub outcome: JobOutcome,
}

impl WebhookEvent {
    /// Parse a raw webhook body, failing closed.
    ///
    /// Returns `None` when the payload carries no recognizable job id
    /// or no *terminal* status; non-terminal and unknown statuses are
    /// progress noise, not outcomes.
    pub fn parse(body: &Value) -> Option<Self> {
        let job_id = extract_job_id(body)?;
        let outcome = match extract_status(body)? {
            JobStatus::Succeeded => JobOutcome::Succeeded {
                outputs: extract_outputs(body),
            },
            JobStatus::Failed => JobOutcome::Failed,
            _ => return None,
        };
        Some(Self { job_id, outcome })
    }
}

/// POST /webhooks/wavespeed
///
/// Always answers 200 `{"ok": true}`; see the module docs for why.
/// Takes the raw body rather than a `Json` extractor so that even a
/// non-JSON payload is acknowledged instead of rejected upstream.
pub async fn wavespeed_webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    let ack = Json(json!({ "ok": true }));

    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::info!(error = %e, "Webhook: non-JSON payload, ignoring");
            return ack;
        }
    };

    let Some(event) = WebhookEvent::parse(&body) else {
        tracing::info!("Webhook: unrecognized or non-terminal payload, ignoring");
        return ack;
    };

    let store = state.pipeline.store.as_ref();

    let record = match store.find_processing_containing(&event.job_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::info!(job_id = %event.job_id, "Webhook: no processing batch owns this job");
            return ack;
        }
        Err(e) => {
            tracing::error!(job_id = %event.job_id, error = %e, "Webhook: batch lookup failed");
            return ack;
        }
    };

    if let Err(e) = reconcile(store, &record.id, &event.job_id, &event.outcome).await {
        tracing::error!(record_id = %record.id, job_id = %event.job_id, error = %e, "Webhook: reconciliation failed");
        return ack;
    }

    if let Err(e) = finalize_if_done(store, &record.id).await {
        tracing::error!(record_id = %record.id, error = %e, "Webhook: completion check failed");
    }

    ack
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_top_level_succeeded_payload() {
        let event = WebhookEvent::parse(&json!({
            "id": "j1",
            "status": "succeeded",
            "outputs": ["https://a"],
        }))
        .unwrap();
        assert_eq!(event.job_id, "j1");
        assert_eq!(
            event.outcome,
            JobOutcome::Succeeded {
                outputs: vec!["https://a".to_string()]
            }
        );
    }

    #[test]
    fn parses_nested_data_failed_payload() {
        let event = WebhookEvent::parse(&json!({
            "data": { "id": "j2", "status": "failed" },
        }))
        .unwrap();
        assert_eq!(event.job_id, "j2");
        assert_eq!(event.outcome, JobOutcome::Failed);
    }

    #[test]
    fn request_id_field_name_is_accepted() {
        let event = WebhookEvent::parse(&json!({
            "requestId": "j3",
            "status": "succeeded",
        }))
        .unwrap();
        assert_eq!(event.job_id, "j3");
    }

    #[test]
    fn missing_job_id_fails_closed() {
        assert!(WebhookEvent::parse(&json!({"status": "succeeded"})).is_none());
    }

    #[test]
    fn non_terminal_status_fails_closed() {
        assert!(WebhookEvent::parse(&json!({"id": "j1", "status": "processing"})).is_none());
        assert!(WebhookEvent::parse(&json!({"id": "j1", "status": "sideways"})).is_none());
    }

    #[test]
    fn missing_status_fails_closed() {
        assert!(WebhookEvent::parse(&json!({"id": "j1"})).is_none());
    }

    #[test]
    fn succeeded_without_outputs_is_valid() {
        let event = WebhookEvent::parse(&json!({"id": "j1", "status": "succeeded"})).unwrap();
        assert_eq!(event.outcome, JobOutcome::Succeeded { outputs: vec![] });
    }
}

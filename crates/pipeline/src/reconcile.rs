//! Event reconciliation: applying one observed sub-job outcome to a
//! batch record, and the completion check.
//!
//! Both functions re-read the record immediately before writing so
//! concurrent updates from the webhook handler and the sweep are not
//! lost. Duplicate events recompute the same state, which is what makes
//! at-least-once delivery safe.

use chrono::Utc;

use wavebatch_core::batch::{apply_outcome, BatchStatus, JobOutcome};
use wavebatch_store::{BatchPatch, RecordStore, StoreError};

/// Apply one sub-job outcome to a batch record.
///
/// Reads the record fresh, applies the outcome (see
/// [`wavebatch_core::batch::apply_outcome`] for the idempotence and
/// disjointness rules), and persists the tracking sets, outputs, and a
/// refreshed `Last Update` in a single write.
pub async fn reconcile(
    store: &dyn RecordStore,
    record_id: &str,
    job_id: &str,
    outcome: &JobOutcome,
) -> Result<(), StoreError> {
    let mut record = store.get(record_id).await?;
    apply_outcome(&mut record, job_id, outcome);

    tracing::debug!(
        record_id,
        job_id,
        seen = record.seen_ids.len(),
        failed = record.failed_ids.len(),
        "Reconciled sub-job outcome"
    );

    store
        .update(
            record_id,
            BatchPatch {
                seen_ids: Some(record.seen_ids),
                failed_ids: Some(record.failed_ids),
                outputs: Some(record.outputs),
                last_update: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
}

/// Flip a batch to `completed` if every requested sub-job has reached a
/// terminal outcome. Returns whether the transition happened.
///
/// Runs from the webhook path after every reconciliation and from the
/// sweep; the status is monotonic, so a record already completed is
/// left alone.
pub async fn finalize_if_done(
    store: &dyn RecordStore,
    record_id: &str,
) -> Result<bool, StoreError> {
    let record = store.get(record_id).await?;
    if record.status != BatchStatus::Processing || !record.all_terminal() {
        return Ok(false);
    }

    let now = Utc::now();
    store
        .update(
            record_id,
            BatchPatch {
                status: Some(BatchStatus::Completed),
                completed_at: Some(now),
                last_update: Some(now),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(
        record_id,
        succeeded = record.seen_ids.len(),
        failed = record.failed_ids.len(),
        "Batch completed"
    );
    Ok(true)
}

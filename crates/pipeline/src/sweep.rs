//! Convergence sweep: the periodic pull side of reconciliation.
//!
//! Each cycle polls every pending sub-job of every `processing` batch,
//! feeds terminal outcomes through the reconciler, force-fails pending
//! sub-jobs on batches past their timeout cutoff, and runs the
//! completion check. A single sub-job or record failure never aborts
//! the rest of the cycle. Runs until the [`CancellationToken`] fires.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use wavebatch_core::batch::{apply_outcome, BatchRecord, JobOutcome};
use wavebatch_core::retry::retry_with_backoff;
use wavebatch_store::BatchPatch;
use wavebatch_wavespeed::JobStatus;

use crate::context::PipelineContext;
use crate::reconcile::{finalize_if_done, reconcile};

/// Run the sweep loop until cancelled.
pub async fn run(ctx: PipelineContext, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        timeout_mins = ctx.batch_timeout.num_minutes(),
        "Convergence sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Convergence sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = sweep_once(&ctx).await {
                    tracing::error!(error = %e, "Sweep cycle failed");
                }
            }
        }
    }
}

/// One full sweep cycle over all `processing` batches.
///
/// Only the initial list query can fail the cycle; per-record errors
/// are logged and skipped.
pub async fn sweep_once(ctx: &PipelineContext) -> Result<(), wavebatch_store::StoreError> {
    let records = ctx.store.list_processing().await?;
    if records.is_empty() {
        tracing::debug!("Sweep: no processing batches");
        return Ok(());
    }

    tracing::debug!(batches = records.len(), "Sweep: reconciling processing batches");

    for record in records {
        let record_id = record.id.clone();
        if let Err(e) = sweep_record(ctx, record).await {
            tracing::warn!(record_id, error = %e, "Sweep: batch reconciliation failed");
        }
    }

    Ok(())
}

/// Reconcile one batch: poll pending sub-jobs, apply the timeout
/// backstop, then check for completion.
async fn sweep_record(
    ctx: &PipelineContext,
    record: BatchRecord,
) -> Result<(), wavebatch_store::StoreError> {
    let pending = record.pending_ids();

    for job_id in &pending {
        let poll = retry_with_backoff(ctx.poll_retry, "wavespeed poll", || {
            ctx.generator.get_job(job_id)
        })
        .await;

        match poll {
            Ok(poll) => match poll.status {
                JobStatus::Succeeded => {
                    let outcome = JobOutcome::Succeeded {
                        outputs: poll.outputs,
                    };
                    reconcile(ctx.store.as_ref(), &record.id, job_id, &outcome).await?;
                }
                JobStatus::Failed => {
                    reconcile(ctx.store.as_ref(), &record.id, job_id, &JobOutcome::Failed).await?;
                }
                // Queued / Processing / Other: still pending, check next cycle.
                _ => {}
            },
            Err(e) => {
                // Transient poll failure leaves the id pending for the
                // next cycle rather than failing the batch.
                tracing::warn!(record_id = %record.id, job_id = %job_id, error = %e, "Sweep: job poll failed");
            }
        }
    }

    // Timeout backstop: force-fail whatever is still pending. Re-read
    // first, since the polls above may have moved ids into the sets.
    if record.timed_out(ctx.batch_timeout, Utc::now()) {
        let mut fresh = ctx.store.get(&record.id).await?;
        let still_pending = fresh.pending_ids();
        if !still_pending.is_empty() {
            tracing::warn!(
                record_id = %record.id,
                forced = still_pending.len(),
                "Sweep: batch timed out, force-failing pending sub-jobs"
            );
            for job_id in &still_pending {
                apply_outcome(&mut fresh, job_id, &JobOutcome::Failed);
            }
            ctx.store
                .update(
                    &record.id,
                    BatchPatch {
                        failed_ids: Some(fresh.failed_ids),
                        last_update: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await?;
        }
    }

    finalize_if_done(ctx.store.as_ref(), &record.id).await?;
    Ok(())
}

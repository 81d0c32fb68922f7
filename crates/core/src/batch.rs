//! Batch record state and the reconciliation transition.
//!
//! A batch tracks N sub-jobs submitted to the generation service. Each
//! sub-job ends up in exactly one of two terminal sets (`seen_ids` for
//! successes, `failed_ids` for failures); once every requested id is in
//! a terminal set the batch flips to `Completed` and never reverts.
//!
//! [`apply_outcome`] is the pure half of the Event Reconciler: it takes
//! a freshly read record plus one observed outcome and produces the
//! next state. Persistence and re-reading live in the pipeline crate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idset;
use crate::outputs::accumulate_outputs;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest number of sub-jobs a batch may request.
pub const MIN_BATCH_COUNT: u32 = 1;
/// Hard ceiling on sub-jobs per batch.
pub const MAX_BATCH_COUNT: u32 = 20;

/// Clamp a requested sub-job count into the allowed range.
pub fn clamp_batch_count(requested: u32) -> u32 {
    requested.clamp(MIN_BATCH_COUNT, MAX_BATCH_COUNT)
}

// ---------------------------------------------------------------------------
// Status and outcomes
// ---------------------------------------------------------------------------

/// Lifecycle status of a batch record. Monotonic: `Processing` moves to
/// `Completed` exactly once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// At least one sub-job has not reached a terminal outcome.
    Processing,
    /// Every sub-job is in `seen_ids` or `failed_ids`.
    Completed,
}

impl BatchStatus {
    /// Stored string form (`"processing"` / `"completed"`).
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
        }
    }

    /// Parse the stored form. Unknown strings are treated as
    /// `Processing` so a hand-edited record degrades to "keep
    /// reconciling" rather than being silently dropped from sweeps.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("completed") {
            BatchStatus::Completed
        } else {
            BatchStatus::Processing
        }
    }
}

/// One observed terminal outcome for a single sub-job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The sub-job produced zero or more output references.
    Succeeded { outputs: Vec<String> },
    /// The sub-job failed remotely, or was force-failed on timeout.
    Failed,
}

// ---------------------------------------------------------------------------
// Batch record
// ---------------------------------------------------------------------------

/// Typed view of one batch record as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    /// Store-assigned identifier, immutable after creation.
    pub id: String,
    /// Sub-job identifiers, fixed at submission time.
    pub request_ids: Vec<String>,
    /// Sub-jobs confirmed succeeded. Grows monotonically.
    pub seen_ids: BTreeSet<String>,
    /// Sub-jobs confirmed failed (including timeout-forced failures).
    /// Grows monotonically.
    pub failed_ids: BTreeSet<String>,
    /// Output references, one group per succeeded sub-job, append-only.
    pub outputs: Vec<String>,
    /// Current lifecycle status.
    pub status: BatchStatus,
    /// Creation timestamp; defines the timeout cutoff.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent mutation. Observability only.
    pub last_update: Option<DateTime<Utc>>,
}

impl BatchRecord {
    /// Sub-job ids that have not yet reached a terminal outcome, in
    /// request order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.request_ids
            .iter()
            .filter(|id| !self.seen_ids.contains(*id) && !self.failed_ids.contains(*id))
            .cloned()
            .collect()
    }

    /// True when every requested sub-job is in a terminal set.
    pub fn all_terminal(&self) -> bool {
        self.request_ids
            .iter()
            .all(|id| self.seen_ids.contains(id) || self.failed_ids.contains(id))
    }

    /// True once the batch has passed its timeout cutoff.
    pub fn timed_out(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> bool {
        now > self.created_at + timeout
    }

    /// Stored comma-delimited form of `seen_ids`.
    pub fn seen_ids_joined(&self) -> String {
        idset::join_id_set(&self.seen_ids)
    }

    /// Stored comma-delimited form of `failed_ids`.
    pub fn failed_ids_joined(&self) -> String {
        idset::join_id_set(&self.failed_ids)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation transition
// ---------------------------------------------------------------------------

/// Apply one observed sub-job outcome to a record, in place.
///
/// Idempotent under at-least-once delivery: an event for an id already
/// in either terminal set is ignored, so the first observed terminal
/// outcome wins, the sets stay disjoint, and neither set ever shrinks.
/// Outputs are appended only when the id is newly seen, so re-delivered
/// success webhooks never duplicate attachments. A late success for an
/// id the sweep already force-failed on timeout is dropped for the same
/// reason: failure is terminal.
pub fn apply_outcome(record: &mut BatchRecord, job_id: &str, outcome: &JobOutcome) {
    if record.seen_ids.contains(job_id) || record.failed_ids.contains(job_id) {
        return;
    }
    match outcome {
        JobOutcome::Succeeded { outputs } => {
            record.outputs = accumulate_outputs(&record.outputs, outputs);
            record.seen_ids.insert(job_id.to_string());
        }
        JobOutcome::Failed => {
            record.failed_ids.insert(job_id.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

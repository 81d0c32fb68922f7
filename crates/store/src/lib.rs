//! Record-store access for batch lifecycle tracking.
//!
//! The backing store is a remote tabular datastore speaking the
//! Airtable v0 REST dialect: records are `{id, createdTime, fields}`
//! objects and list queries filter with `filterByFormula`. The
//! [`RecordStore`] trait abstracts the handful of typed operations the
//! pipeline needs, so tests run against [`memory::InMemoryStore`]
//! instead of the network.

pub mod client;
pub mod memory;
pub mod record;

pub use client::{StoreError, TableStore};

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wavebatch_core::batch::{BatchRecord, BatchStatus};

/// Partial update of a batch record. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct BatchPatch {
    /// Replace the stored request-id list.
    pub request_ids: Option<Vec<String>>,
    /// Replace the succeeded-id set.
    pub seen_ids: Option<BTreeSet<String>>,
    /// Replace the failed-id set.
    pub failed_ids: Option<BTreeSet<String>>,
    /// Replace the output list.
    pub outputs: Option<Vec<String>>,
    /// Move the record to a new status.
    pub status: Option<BatchStatus>,
    /// Stamp the completion time (written with the `Completed` flip).
    pub completed_at: Option<DateTime<Utc>>,
    /// Refresh the last-update timestamp.
    pub last_update: Option<DateTime<Utc>>,
}

impl BatchPatch {
    /// Apply this patch to an in-memory record (used by the in-memory
    /// store; the remote store applies patches server-side).
    pub fn apply_to(&self, record: &mut BatchRecord) {
        if let Some(ids) = &self.request_ids {
            record.request_ids = ids.clone();
        }
        if let Some(seen) = &self.seen_ids {
            record.seen_ids = seen.clone();
        }
        if let Some(failed) = &self.failed_ids {
            record.failed_ids = failed.clone();
        }
        if let Some(outputs) = &self.outputs {
            record.outputs = outputs.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(ts) = self.last_update {
            record.last_update = Some(ts);
        }
    }
}

/// Typed operations the pipeline performs against the record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a new batch record in `processing` status with empty
    /// tracking sets. Returns the record with its store-assigned id.
    async fn create(&self, prompt: &str) -> Result<BatchRecord, StoreError>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<BatchRecord, StoreError>;

    /// Apply a partial update to one record.
    async fn update(&self, id: &str, patch: BatchPatch) -> Result<(), StoreError>;

    /// All records currently in `processing` status.
    async fn list_processing(&self) -> Result<Vec<BatchRecord>, StoreError>;

    /// The `processing` record whose request-id list contains `job_id`,
    /// if any. Used by the webhook handler to locate the owning batch.
    async fn find_processing_containing(
        &self,
        job_id: &str,
    ) -> Result<Option<BatchRecord>, StoreError>;
}

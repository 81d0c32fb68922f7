//! In-memory [`RecordStore`] used by pipeline and HTTP-layer tests.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use wavebatch_core::batch::{BatchRecord, BatchStatus};

use crate::{BatchPatch, RecordStore, StoreError};

/// Test double holding records in a map. `create` assigns sequential
/// `rec{n}` ids. All operations mirror the remote store's semantics,
/// including partial-field patching.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, BatchRecord>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing `create` (for tests that need
    /// a batch in a specific starting state).
    pub async fn insert(&self, record: BatchRecord) {
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record);
    }

    /// Snapshot one record for assertions.
    pub async fn snapshot(&self, id: &str) -> Option<BatchRecord> {
        self.records.lock().await.get(id).cloned()
    }
}

/// The remote store reports missing records as a 404.
fn not_found(id: &str) -> StoreError {
    StoreError::Api {
        status: 404,
        body: format!("record {id} not found"),
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn create(&self, _prompt: &str) -> Result<BatchRecord, StoreError> {
        let id = format!("rec{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = BatchRecord {
            id: id.clone(),
            request_ids: Vec::new(),
            seen_ids: BTreeSet::new(),
            failed_ids: BTreeSet::new(),
            outputs: Vec::new(),
            status: BatchStatus::Processing,
            created_at: Utc::now(),
            last_update: None,
        };
        self.records.lock().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<BatchRecord, StoreError> {
        self.records
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: &str, patch: BatchPatch) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        patch.apply_to(record);
        Ok(())
    }

    async fn list_processing(&self) -> Result<Vec<BatchRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.status == BatchStatus::Processing)
            .cloned()
            .collect())
    }

    async fn find_processing_containing(
        &self,
        job_id: &str,
    ) -> Result<Option<BatchRecord>, StoreError> {
        // The remote query is a substring FIND() over the stored id
        // list, so a job id that is a prefix of another id matches.
        // Mirrored here so tests see the same behavior.
        Ok(self
            .records
            .lock()
            .await
            .values()
            .find(|r| {
                r.status == BatchStatus::Processing
                    && r.request_ids.iter().any(|id| id.contains(job_id))
            })
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = InMemoryStore::new();
        let created = store.create("a cat").await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.status, BatchStatus::Processing);
    }

    #[tokio::test]
    async fn get_missing_record_is_api_404() {
        let store = InMemoryStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn patch_updates_only_named_fields() {
        let store = InMemoryStore::new();
        let created = store.create("p").await.unwrap();
        store
            .update(
                &created.id,
                BatchPatch {
                    request_ids: Some(vec!["j1".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.request_ids, vec!["j1".to_string()]);
        assert_eq!(fetched.status, BatchStatus::Processing);
    }

    #[tokio::test]
    async fn find_matches_on_request_id_containment() {
        let store = InMemoryStore::new();
        let created = store.create("p").await.unwrap();
        store
            .update(
                &created.id,
                BatchPatch {
                    request_ids: Some(vec!["j1".into(), "j2".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let hit = store.find_processing_containing("j2").await.unwrap();
        assert_eq!(hit.unwrap().id, created.id);
        let miss = store.find_processing_containing("j9").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn find_uses_substring_match_like_the_remote_formula() {
        let store = InMemoryStore::new();
        let created = store.create("p").await.unwrap();
        store
            .update(
                &created.id,
                BatchPatch {
                    request_ids: Some(vec!["j10".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // "j1" is a prefix of "j10"; the remote FIND() formula matches
        // it, so the fake must too.
        let hit = store.find_processing_containing("j1").await.unwrap();
        assert_eq!(hit.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn completed_records_are_excluded_from_queries() {
        let store = InMemoryStore::new();
        let created = store.create("p").await.unwrap();
        store
            .update(
                &created.id,
                BatchPatch {
                    request_ids: Some(vec!["j1".into()]),
                    status: Some(BatchStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.list_processing().await.unwrap().is_empty());
        assert!(store
            .find_processing_containing("j1")
            .await
            .unwrap()
            .is_none());
    }
}

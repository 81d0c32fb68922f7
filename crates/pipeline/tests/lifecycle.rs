//! End-to-end lifecycle tests for submission, reconciliation, and the
//! convergence sweep, driven against the in-memory record store and a
//! scripted generation-service fake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use wavebatch_core::batch::{BatchStatus, JobOutcome};
use wavebatch_core::retry::RetryPolicy;
use wavebatch_pipeline::{
    finalize_if_done, reconcile, submit_batch, sweep, BatchRequest, PipelineContext, PipelineError,
};
use wavebatch_store::memory::InMemoryStore;
use wavebatch_store::{BatchPatch, RecordStore};
use wavebatch_wavespeed::{GenerationService, JobPoll, JobStatus, SubmitJobRequest, WaveSpeedError};

// ---------------------------------------------------------------------------
// Scripted generation service
// ---------------------------------------------------------------------------

/// Fake WaveSpeed: submissions hand out sequential `job{n}` ids (or a
/// scripted failure at a given submission index), polls answer from a
/// programmable table.
#[derive(Default)]
struct ScriptedGenerator {
    submit_count: AtomicU64,
    /// 0-based submission index that should fail every attempt.
    fail_submit_at: Option<u64>,
    polls: Mutex<HashMap<String, JobPoll>>,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self::default()
    }

    fn failing_submit_at(index: u64) -> Self {
        Self {
            fail_submit_at: Some(index),
            ..Self::default()
        }
    }

    async fn set_poll(&self, job_id: &str, status: JobStatus, outputs: &[&str]) {
        self.polls.lock().await.insert(
            job_id.to_string(),
            JobPoll {
                status,
                outputs: outputs.iter().map(ToString::to_string).collect(),
            },
        );
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn submit(&self, _request: &SubmitJobRequest) -> Result<String, WaveSpeedError> {
        let index = self.submit_count.fetch_add(1, Ordering::SeqCst);
        if Some(index) == self.fail_submit_at {
            // Keep the counter pointing at this index so retries of the
            // same submission keep failing.
            self.submit_count.store(index, Ordering::SeqCst);
            return Err(WaveSpeedError::Api {
                status: 500,
                body: "scripted failure".into(),
            });
        }
        Ok(format!("job{}", index + 1))
    }

    async fn get_job(&self, job_id: &str) -> Result<JobPoll, WaveSpeedError> {
        self.polls
            .lock()
            .await
            .get(job_id)
            .cloned()
            .ok_or(WaveSpeedError::Api {
                status: 500,
                body: format!("no scripted poll for {job_id}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_ctx(store: Arc<InMemoryStore>, generator: Arc<ScriptedGenerator>) -> PipelineContext {
    PipelineContext {
        store,
        generator,
        http: reqwest::Client::new(),
        webhook_url: "http://localhost:3000/webhooks/wavespeed".into(),
        submit_spacing: Duration::from_millis(0),
        batch_timeout: chrono::Duration::minutes(30),
        submit_retry: RetryPolicy::new(2, Duration::from_millis(1)),
        poll_retry: RetryPolicy::new(2, Duration::from_millis(1)),
    }
}

/// Serve one PNG-ish payload over loopback so image fetches hit a real
/// HTTP endpoint.
async fn serve_test_image() -> String {
    use axum::routing::get;

    let app = axum::Router::new().route(
        "/subject.png",
        get(|| async { ([("content-type", "image/png")], vec![0x89u8, 0x50, 0x4e, 0x47]) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/subject.png")
}

fn batch_request(subject_url: &str, count: u32) -> BatchRequest {
    BatchRequest {
        prompt: "a cat in a hat".into(),
        subject_url: subject_url.to_string(),
        reference_urls: Vec::new(),
        width: 1024,
        height: 1024,
        count,
    }
}

/// Seed a processing record with the given request ids.
async fn seed_record(store: &InMemoryStore, request_ids: &[&str]) -> String {
    let record = store.create("seeded").await.unwrap();
    store
        .update(
            &record.id,
            BatchPatch {
                request_ids: Some(request_ids.iter().map(ToString::to_string).collect()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    record.id
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_creates_record_and_persists_job_ids() {
    let subject_url = serve_test_image().await;
    let store = Arc::new(InMemoryStore::new());
    let ctx = make_ctx(store.clone(), Arc::new(ScriptedGenerator::new()));

    let submitted = submit_batch(&ctx, &batch_request(&subject_url, 3))
        .await
        .unwrap();

    assert_eq!(submitted.request_ids, vec!["job1", "job2", "job3"]);
    let record = store.snapshot(&submitted.record_id).await.unwrap();
    assert_eq!(record.request_ids, submitted.request_ids);
    assert_eq!(record.status, BatchStatus::Processing);
    assert!(record.seen_ids.is_empty() && record.failed_ids.is_empty());
}

#[tokio::test]
async fn submit_clamps_count_into_allowed_range() {
    let subject_url = serve_test_image().await;
    let store = Arc::new(InMemoryStore::new());
    let ctx = make_ctx(store.clone(), Arc::new(ScriptedGenerator::new()));

    let submitted = submit_batch(&ctx, &batch_request(&subject_url, 0))
        .await
        .unwrap();
    assert_eq!(submitted.request_ids.len(), 1);
}

#[tokio::test]
async fn submit_partial_failure_keeps_earlier_ids() {
    let subject_url = serve_test_image().await;
    let store = Arc::new(InMemoryStore::new());
    // Second sub-job fails every attempt.
    let generator = Arc::new(ScriptedGenerator::failing_submit_at(1));
    let ctx = make_ctx(store.clone(), generator);

    let err = submit_batch(&ctx, &batch_request(&subject_url, 3))
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::GenerationExhausted(_));

    // The one id that made it is persisted; no rollback.
    let records = store.list_processing().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_ids, vec!["job1"]);
}

#[tokio::test]
async fn submit_fails_fast_on_unreachable_image() {
    let store = Arc::new(InMemoryStore::new());
    let ctx = make_ctx(store.clone(), Arc::new(ScriptedGenerator::new()));

    // Port 1 on loopback refuses connections.
    let err = submit_batch(&ctx, &batch_request("http://127.0.0.1:1/x.png", 2))
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::ImageFetch { .. });

    // No record was created.
    assert!(store.list_processing().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconcile_success_then_failure_completes_batch() {
    let store = InMemoryStore::new();
    let id = seed_record(&store, &["j1", "j2"]).await;

    let outcome = JobOutcome::Succeeded {
        outputs: vec!["u1".into()],
    };
    reconcile(&store, &id, "j1", &outcome).await.unwrap();
    assert!(!finalize_if_done(&store, &id).await.unwrap());

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.seen_ids.contains("j1"));
    assert_eq!(record.outputs, vec!["u1".to_string()]);
    assert_eq!(record.status, BatchStatus::Processing);

    reconcile(&store, &id, "j2", &JobOutcome::Failed)
        .await
        .unwrap();
    assert!(finalize_if_done(&store, &id).await.unwrap());

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.failed_ids.contains("j2"));
    assert_eq!(record.status, BatchStatus::Completed);
}

#[tokio::test]
async fn duplicate_webhook_does_not_duplicate_outputs() {
    let store = InMemoryStore::new();
    let id = seed_record(&store, &["j1", "j2"]).await;

    let outcome = JobOutcome::Succeeded {
        outputs: vec!["u1".into()],
    };
    reconcile(&store, &id, "j1", &outcome).await.unwrap();
    let once = store.snapshot(&id).await.unwrap();

    reconcile(&store, &id, "j1", &outcome).await.unwrap();
    let twice = store.snapshot(&id).await.unwrap();

    assert_eq!(once.outputs, twice.outputs);
    assert_eq!(once.seen_ids, twice.seen_ids);
}

#[tokio::test]
async fn late_success_webhook_after_forced_failure_is_dropped() {
    let store = InMemoryStore::new();
    let id = seed_record(&store, &["j1", "j2"]).await;

    // The sweep force-failed j2 on timeout, then its success webhook
    // finally arrives while the batch is still processing.
    reconcile(&store, &id, "j2", &JobOutcome::Failed)
        .await
        .unwrap();
    let outcome = JobOutcome::Succeeded {
        outputs: vec!["u2".into()],
    };
    reconcile(&store, &id, "j2", &outcome).await.unwrap();

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.failed_ids.contains("j2"));
    assert!(record.seen_ids.is_empty());
    assert!(record.outputs.is_empty());
}

#[tokio::test]
async fn reconcile_converges_under_any_delivery_order() {
    let ids = ["a", "b", "c"];
    let mut final_states = Vec::new();

    for order in [["a", "b", "c"], ["c", "b", "a"], ["b", "c", "a"]] {
        let store = InMemoryStore::new();
        let id = seed_record(&store, &ids).await;
        for job in order {
            let outcome = JobOutcome::Succeeded {
                outputs: vec![format!("u-{job}")],
            };
            reconcile(&store, &id, job, &outcome).await.unwrap();
            finalize_if_done(&store, &id).await.unwrap();
        }
        let record = store.snapshot(&id).await.unwrap();
        assert_eq!(record.status, BatchStatus::Completed);
        let mut outputs = record.outputs.clone();
        outputs.sort();
        final_states.push((record.seen_ids.clone(), record.failed_ids.clone(), outputs));
    }

    assert!(final_states.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn finalize_leaves_completed_record_alone() {
    let store = InMemoryStore::new();
    let id = seed_record(&store, &["j1"]).await;
    reconcile(&store, &id, "j1", &JobOutcome::Failed)
        .await
        .unwrap();
    assert!(finalize_if_done(&store, &id).await.unwrap());
    // Second check is a no-op, not a second transition.
    assert!(!finalize_if_done(&store, &id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_applies_polled_outcomes() {
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let id = seed_record(&store, &["j1", "j2"]).await;

    generator
        .set_poll("j1", JobStatus::Succeeded, &["https://out/1"])
        .await;
    generator.set_poll("j2", JobStatus::Processing, &[]).await;

    let ctx = make_ctx(store.clone(), generator.clone());
    sweep::sweep_once(&ctx).await.unwrap();

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.seen_ids.contains("j1"));
    assert_eq!(record.outputs, vec!["https://out/1".to_string()]);
    assert_eq!(record.pending_ids(), vec!["j2".to_string()]);
    assert_eq!(record.status, BatchStatus::Processing);

    // Next cycle j2 fails remotely; the batch completes.
    generator.set_poll("j2", JobStatus::Failed, &[]).await;
    sweep::sweep_once(&ctx).await.unwrap();

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.failed_ids.contains("j2"));
    assert_eq!(record.status, BatchStatus::Completed);
}

#[tokio::test]
async fn sweep_tolerates_poll_failures() {
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let id = seed_record(&store, &["j1", "j2"]).await;

    // j1 has no scripted poll (every attempt errors); j2 succeeds.
    generator
        .set_poll("j2", JobStatus::Succeeded, &["https://out/2"])
        .await;

    let ctx = make_ctx(store.clone(), generator);
    sweep::sweep_once(&ctx).await.unwrap();

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.seen_ids.contains("j2"));
    // j1 stays pending for the next cycle instead of failing the batch.
    assert_eq!(record.pending_ids(), vec!["j1".to_string()]);
    assert_eq!(record.status, BatchStatus::Processing);
}

#[tokio::test]
async fn sweep_forces_timeout_then_completes() {
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let id = seed_record(&store, &["j1", "j2", "j3"]).await;

    // j1 already succeeded in an earlier cycle; j2/j3 never report.
    reconcile(
        store.as_ref(),
        &id,
        "j1",
        &JobOutcome::Succeeded {
            outputs: vec!["u1".into()],
        },
    )
    .await
    .unwrap();
    generator.set_poll("j2", JobStatus::Queued, &[]).await;
    generator.set_poll("j3", JobStatus::Queued, &[]).await;

    // Push the record past its cutoff.
    let mut stale = store.snapshot(&id).await.unwrap();
    stale.created_at = Utc::now() - chrono::Duration::hours(2);
    store.insert(stale).await;

    let ctx = make_ctx(store.clone(), generator);
    sweep::sweep_once(&ctx).await.unwrap();

    let record = store.snapshot(&id).await.unwrap();
    assert!(record.seen_ids.contains("j1"));
    assert!(record.failed_ids.contains("j2") && record.failed_ids.contains("j3"));
    assert!(record.seen_ids.is_disjoint(&record.failed_ids));
    assert_eq!(record.status, BatchStatus::Completed);
    // The earlier success keeps its output.
    assert_eq!(record.outputs, vec!["u1".to_string()]);
}

#[tokio::test]
async fn sweep_skips_completed_batches() {
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let id = seed_record(&store, &["j1"]).await;

    reconcile(store.as_ref(), &id, "j1", &JobOutcome::Failed)
        .await
        .unwrap();
    finalize_if_done(store.as_ref(), &id).await.unwrap();
    let before = store.snapshot(&id).await.unwrap();

    // No polls scripted: if the sweep touched this batch it would log
    // failures, but more importantly must not mutate it.
    let ctx = make_ctx(store.clone(), generator);
    sweep::sweep_once(&ctx).await.unwrap();

    let after = store.snapshot(&id).await.unwrap();
    assert_eq!(before.seen_ids, after.seen_ids);
    assert_eq!(before.failed_ids, after.failed_ids);
    assert_eq!(after.status, BatchStatus::Completed);
}

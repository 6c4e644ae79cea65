//! Scan workflow integration tests: mocks at the three trait boundaries,
//! one real `ScanRunner`, assertions on job records and stored state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use followlens_scan::testing::*;
use followlens_scan::{
    AccountStore, Job, JobStore, MemoryStore, ScanError, ScanRegistry, ScanRunner, ScanStage,
    ScanTarget,
};

fn build_runner(
    source: MockSource,
    model: MockModel,
    store: Arc<dyn AccountStore>,
) -> Arc<ScanRunner> {
    Arc::new(ScanRunner::new(
        Arc::new(source),
        Arc::new(model),
        store,
        Arc::new(JobStore::new()),
        Arc::new(ScanRegistry::new()),
        ChronoDuration::days(7),
    ))
}

async fn wait_terminal(runner: &ScanRunner, job_id: &str) -> Job {
    for _ in 0..500 {
        if let Some(job) = runner.jobs().get(job_id) {
            if job.stage.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_to_end_scan_reaches_completed_with_final_counters() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(3)),
        MockModel::new(taxonomy(&["Tech", "News"])),
        store.clone(),
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    assert_eq!(job.stage, ScanStage::Pending);

    let done = wait_terminal(&runner, &job.job_id).await;
    assert_eq!(done.stage, ScanStage::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.accounts_fetched, 3);
    assert_eq!(done.accounts_categorized, 3);
    assert_eq!(done.accounts_saved, 3);
    assert_eq!(done.categories_discovered, 2);
    assert!(done.completed_at.is_some());

    assert_eq!(store.fetch_all().await.unwrap().len(), 3);
    let taxonomy = store.fetch_taxonomy().await.unwrap().unwrap();
    assert_eq!(taxonomy.categories.len(), 2);
}

#[tokio::test]
async fn handle_is_resolved_before_scanning() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(1)).with_handle("alice", "42"),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let job = runner.submit(ScanTarget::by_handle("@alice")).await.unwrap();
    assert_eq!(job.user_id, "42");

    let done = wait_terminal(&runner, &job.job_id).await;
    assert_eq!(done.stage, ScanStage::Completed);
}

#[tokio::test]
async fn progress_is_monotonic_and_listener_sees_terminal_snapshot() {
    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(
        ScanRunner::new(
            Arc::new(MockSource::new(accounts(25))),
            Arc::new(MockModel::new(taxonomy(&["Tech"]))),
            store,
            Arc::new(JobStore::new()),
            Arc::new(ScanRegistry::new()),
            ChronoDuration::days(7),
        )
        .with_batch_size(10)
        .with_listener(Arc::new(move |job| {
            sink.lock().unwrap().push(job.progress);
        })),
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;
    assert_eq!(done.stage, ScanStage::Completed);

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {seen:?}");
    assert_eq!(*seen.last().unwrap(), 100);
}

#[tokio::test]
async fn panicking_listener_does_not_abort_the_scan() {
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(
        ScanRunner::new(
            Arc::new(MockSource::new(accounts(2))),
            Arc::new(MockModel::new(taxonomy(&["Tech"]))),
            store,
            Arc::new(JobStore::new()),
            Arc::new(ScanRegistry::new()),
            ChronoDuration::days(7),
        )
        .with_listener(Arc::new(|_| panic!("broken notification channel"))),
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;
    assert_eq!(done.stage, ScanStage::Completed);
}

// ---------------------------------------------------------------------------
// Validation and concurrency guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_scan_for_same_identity_is_rejected_without_a_job() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(2)).with_delay(Duration::from_millis(200)),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let first = runner.submit(ScanTarget::by_id("42")).await.unwrap();

    let rejected = runner.submit(ScanTarget::by_id("42")).await;
    assert!(matches!(rejected, Err(ScanError::ScanInProgress(_))));

    // A different identity is not blocked.
    let other = runner.submit(ScanTarget::by_id("43")).await;
    assert!(other.is_ok());

    let done = wait_terminal(&runner, &first.job_id).await;
    assert_eq!(done.stage, ScanStage::Completed);

    // Registration is released at terminal state; the identity can be
    // scanned again.
    let mut resubmitted = runner.submit(ScanTarget::by_id("42")).await;
    for _ in 0..100 {
        if resubmitted.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        resubmitted = runner.submit(ScanTarget::by_id("42")).await;
    }
    assert!(resubmitted.is_ok());
}

#[tokio::test]
async fn target_must_name_exactly_one_identity() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(1)),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let neither = runner.submit(ScanTarget::default()).await;
    assert!(matches!(neither, Err(ScanError::Validation(_))));

    let blank = runner.submit(ScanTarget::by_id("   ")).await;
    assert!(matches!(blank, Err(ScanError::Validation(_))));

    let both = runner
        .submit(ScanTarget {
            user_id: Some("42".to_string()),
            handle: Some("alice".to_string()),
            force_refresh: false,
        })
        .await;
    assert!(matches!(both, Err(ScanError::Validation(_))));
}

#[tokio::test]
async fn unknown_handle_is_a_distinct_error() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(1)),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let result = runner.submit(ScanTarget::by_handle("nobody")).await;
    match result {
        Err(ScanError::HandleNotFound(handle)) => assert_eq!(handle, "nobody"),
        other => panic!("expected HandleNotFound, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Failure attribution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_accounts_fetched_fails_at_fetching() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(Vec::new()),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;

    assert_eq!(done.stage, ScanStage::Error);
    assert_eq!(done.failed_stage, Some(ScanStage::Fetching));
    assert!(done.error.unwrap().contains("No accounts"));
}

#[tokio::test]
async fn source_failure_is_attributed_to_the_identity_source() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(2)).failing(),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;

    assert_eq!(done.stage, ScanStage::Error);
    assert_eq!(done.failed_stage, Some(ScanStage::Fetching));
    assert_eq!(done.error_origin.as_deref(), Some("identity_source"));
    assert!(done.error.unwrap().contains("simulated fetch failure"));
}

#[tokio::test]
async fn model_failure_is_attributed_to_the_classification_stage() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(accounts(2)),
        MockModel::new(taxonomy(&["Tech"])).failing_discover(),
        store,
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;

    assert_eq!(done.stage, ScanStage::Error);
    assert_eq!(done.failed_stage, Some(ScanStage::Classifying));
    assert_eq!(done.error_origin.as_deref(), Some("model"));
}

#[tokio::test]
async fn persistence_failure_is_attributed_to_saving() {
    let store = Arc::new(FailingStore::new().fail_account_writes());
    let runner = build_runner(
        MockSource::new(accounts(3)),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    let done = wait_terminal(&runner, &job.job_id).await;

    assert_eq!(done.stage, ScanStage::Error);
    assert_eq!(done.failed_stage, Some(ScanStage::Saving));
    assert_eq!(done.error_origin.as_deref(), Some("storage"));
    // Classification succeeded; only persistence failed. The caller must
    // not assume anything was saved.
    assert_eq!(done.accounts_categorized, 3);
    assert_eq!(done.accounts_saved, 0);
}

#[tokio::test]
async fn failed_job_remains_queryable() {
    let store = Arc::new(MemoryStore::new());
    let runner = build_runner(
        MockSource::new(Vec::new()),
        MockModel::new(taxonomy(&["Tech"])),
        store,
    );

    let job = runner.submit(ScanTarget::by_id("42")).await.unwrap();
    wait_terminal(&runner, &job.job_id).await;

    let fetched = runner.jobs().get(&job.job_id).unwrap();
    assert_eq!(fetched.stage, ScanStage::Error);
    assert!(fetched.error.is_some());
}

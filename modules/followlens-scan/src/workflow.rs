//! The scan workflow: fetch → discover/classify → persist, run as a spawned
//! background task per job, with stage-attributed failures and an
//! at-most-one-active-scan-per-identity guard.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::FutureExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::categorizer::Categorizer;
use crate::error::ScanError;
use crate::jobs::{Job, JobStore, ScanRegistry, ScanStage};
use crate::traits::{AccountStore, ClassificationModel, FollowingSource};

/// Best-effort observer of job snapshots. A panicking listener is logged
/// and ignored; it never aborts the scan.
pub type ProgressListener = Arc<dyn Fn(&Job) + Send + Sync>;

/// What to scan: exactly one of a user id or a handle, non-empty after
/// trimming. A handle is resolved through the identity source first.
#[derive(Debug, Clone, Default)]
pub struct ScanTarget {
    pub user_id: Option<String>,
    pub handle: Option<String>,
    pub force_refresh: bool,
}

impl ScanTarget {
    pub fn by_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn by_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
            ..Self::default()
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

pub struct ScanRunner {
    source: Arc<dyn FollowingSource>,
    store: Arc<dyn AccountStore>,
    categorizer: Categorizer,
    jobs: Arc<JobStore>,
    registry: Arc<ScanRegistry>,
    listener: Option<ProgressListener>,
}

impl ScanRunner {
    pub fn new(
        source: Arc<dyn FollowingSource>,
        model: Arc<dyn ClassificationModel>,
        store: Arc<dyn AccountStore>,
        jobs: Arc<JobStore>,
        registry: Arc<ScanRegistry>,
        freshness_window: Duration,
    ) -> Self {
        let categorizer = Categorizer::new(model, store.clone(), freshness_window);
        Self {
            source,
            store,
            categorizer,
            jobs,
            registry,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.categorizer = self.categorizer.with_batch_size(batch_size);
        self
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Validate the target, claim the identity, create the job and spawn
    /// the scan task. Returns the initial job snapshot.
    ///
    /// A second scan for an identity whose first is still running is
    /// rejected here, before any job record exists.
    pub async fn submit(self: &Arc<Self>, target: ScanTarget) -> Result<Job, ScanError> {
        let user_id = self.resolve_target(&target).await?;

        let job_id = Uuid::new_v4().to_string();
        if !self.registry.try_register(&user_id, &job_id) {
            return Err(ScanError::ScanInProgress(user_id));
        }

        let job = self.jobs.create(&job_id, &user_id);
        info!(job_id, user_id, "Scan accepted");

        let runner = Arc::clone(self);
        let force_refresh = target.force_refresh;
        tokio::spawn(async move {
            let result = AssertUnwindSafe(runner.execute(&job_id, &user_id, force_refresh))
                .catch_unwind()
                .await;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    // A panic still needs stage attribution; the job record
                    // knows where the task was.
                    let stage = runner
                        .jobs
                        .get(&job_id)
                        .map(|j| j.stage)
                        .unwrap_or(ScanStage::Pending);
                    Err((stage, ScanError::Internal("scan task panicked".to_string())))
                }
            };

            if let Err((stage, err)) = outcome {
                runner.fail(&job_id, stage, &err);
            }

            // Exactly once, whatever the outcome.
            runner.registry.release(&user_id);
        });

        Ok(job)
    }

    async fn resolve_target(&self, target: &ScanTarget) -> Result<String, ScanError> {
        let user_id = target
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let handle = target
            .handle
            .as_deref()
            .map(|h| h.trim().trim_start_matches('@'))
            .filter(|s| !s.is_empty());

        match (user_id, handle) {
            (Some(id), None) => Ok(id.to_string()),
            (None, Some(handle)) => match self.source.resolve_handle(handle).await? {
                Some(id) => Ok(id),
                None => Err(ScanError::HandleNotFound(handle.to_string())),
            },
            (Some(_), Some(_)) => Err(ScanError::Validation(
                "supply either a user id or a handle, not both".to_string(),
            )),
            (None, None) => Err(ScanError::Validation(
                "a user id or handle is required".to_string(),
            )),
        }
    }

    async fn execute(
        &self,
        job_id: &str,
        user_id: &str,
        force_refresh: bool,
    ) -> Result<(), (ScanStage, ScanError)> {
        // --- fetching (0-30) ---
        self.advance(job_id, |j| {
            j.stage = ScanStage::Fetching;
            j.progress = 5;
            j.message = "Fetching followed accounts".to_string();
        });

        let accounts = self
            .source
            .fetch_all_following(user_id)
            .await
            .map_err(|e| (ScanStage::Fetching, ScanError::from(e)))?;

        // An empty following list is a failed scan, not a degenerate
        // success.
        if accounts.is_empty() {
            return Err((ScanStage::Fetching, ScanError::NoAccounts));
        }

        self.advance(job_id, |j| {
            j.accounts_fetched = accounts.len();
            j.progress = 30;
            j.message = format!("Fetched {} accounts", accounts.len());
        });

        // --- discovering/classifying (30-90) ---
        self.advance(job_id, |j| {
            j.stage = ScanStage::Classifying;
            j.message = "Discovering and classifying accounts".to_string();
        });

        let jobs = Arc::clone(&self.jobs);
        let listener = self.listener.clone();
        let jid = job_id.to_string();
        let progress = move |done: usize, total: usize| {
            let pct = 30 + (done * 60 / total.max(1)).min(60);
            let snapshot = jobs.update(&jid, |j| {
                j.progress = pct as u8;
                j.accounts_categorized = done;
                j.message = format!("Classifying account {done}/{total}");
            });
            if let (Some(listener), Some(job)) = (&listener, snapshot) {
                notify(listener, &job);
            }
        };

        let outcome = self
            .categorizer
            .categorize(&accounts, force_refresh, &progress)
            .await
            .map_err(|e| (ScanStage::Classifying, e))?;

        self.advance(job_id, |j| {
            j.accounts_categorized = outcome.accounts.len();
            j.categories_discovered = outcome.taxonomy.categories.len();
            j.progress = 90;
            j.message = format!(
                "Classified {} accounts ({} from cache)",
                outcome.accounts.len(),
                outcome.from_cache
            );
        });

        // --- saving (90-100) ---
        self.advance(job_id, |j| {
            j.stage = ScanStage::Saving;
            j.message = "Saving classified accounts".to_string();
        });

        self.store
            .upsert_accounts(&outcome.accounts)
            .await
            .map_err(|e| (ScanStage::Saving, ScanError::Storage(e.to_string())))?;
        self.store
            .upsert_taxonomy(&outcome.taxonomy)
            .await
            .map_err(|e| (ScanStage::Saving, ScanError::Storage(e.to_string())))?;

        self.advance(job_id, |j| {
            j.stage = ScanStage::Completed;
            j.progress = 100;
            j.accounts_saved = outcome.accounts.len();
            j.message = "Scan completed".to_string();
            j.completed_at = Some(Utc::now());
        });
        info!(
            job_id,
            accounts = outcome.accounts.len(),
            categories = outcome.taxonomy.categories.len(),
            from_cache = outcome.from_cache,
            "Scan completed"
        );

        Ok(())
    }

    fn advance(&self, job_id: &str, mutate: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.update(job_id, mutate) {
            if let Some(listener) = &self.listener {
                notify(listener, &job);
            }
        }
    }

    fn fail(&self, job_id: &str, stage: ScanStage, err: &ScanError) {
        error!(job_id, stage = %stage, origin = err.origin(), error = %err, "Scan failed");
        self.advance(job_id, |j| {
            j.stage = ScanStage::Error;
            j.failed_stage = Some(stage);
            j.error = Some(err.to_string());
            j.error_origin = Some(err.origin().to_string());
            j.message = "Scan failed".to_string();
            j.completed_at = Some(Utc::now());
        });
    }
}

fn notify(listener: &ProgressListener, job: &Job) {
    if std::panic::catch_unwind(AssertUnwindSafe(|| listener(job))).is_err() {
        warn!(job_id = %job.job_id, "Progress listener panicked, continuing");
    }
}

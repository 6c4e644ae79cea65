//! Job-scoped scan status: an in-memory, mutex-guarded map read by pollers
//! and push channels, plus the active-scan registry that enforces at most
//! one running scan per identity.
//!
//! Both are explicit service objects constructed once per process and
//! passed by handle. Nothing here survives a restart, by design.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scan pipeline stage. `Classifying` covers both taxonomy discovery and
/// batch classification and reads as "running" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStage {
    Pending,
    Fetching,
    #[serde(rename = "running")]
    Classifying,
    Saving,
    Completed,
    Error,
}

impl ScanStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStage::Completed | ScanStage::Error)
    }
}

impl std::fmt::Display for ScanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStage::Pending => write!(f, "pending"),
            ScanStage::Fetching => write!(f, "fetching"),
            ScanStage::Classifying => write!(f, "running"),
            ScanStage::Saving => write!(f, "saving"),
            ScanStage::Completed => write!(f, "completed"),
            ScanStage::Error => write!(f, "error"),
        }
    }
}

/// One scan-workflow run. Mutated in place through `JobStore::update`;
/// retained after reaching a terminal stage until explicitly removed.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub stage: ScanStage,
    /// 0-100, non-decreasing.
    pub progress: u8,
    pub message: String,
    pub accounts_fetched: usize,
    pub accounts_categorized: usize,
    pub accounts_saved: usize,
    pub categories_discovered: usize,
    pub error: Option<String>,
    /// Origin of the failure: identity_source / model / storage /
    /// validation / internal.
    pub error_origin: Option<String>,
    /// The stage that was active when the failure occurred.
    pub failed_stage: Option<ScanStage>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(job_id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            user_id: user_id.to_string(),
            stage: ScanStage::Pending,
            progress: 0,
            message: "Scan accepted".to_string(),
            accounts_fetched: 0,
            accounts_categorized: 0,
            accounts_saved: 0,
            categories_discovered: 0,
            error: None,
            error_origin: None,
            failed_stage: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Synchronized job_id → Job map. All reads are snapshots; all writes go
/// through `update` so concurrent pollers never observe a torn record.
#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, job_id: &str, user_id: &str) -> Job {
        let job = Job::new(job_id, user_id);
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .insert(job_id.to_string(), job.clone());
        job
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .get(job_id)
            .cloned()
    }

    /// Apply a mutation and return the resulting snapshot. Progress is kept
    /// non-decreasing regardless of what the mutation wrote.
    pub fn update(&self, job_id: &str, mutate: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut jobs = self.jobs.lock().expect("job map lock poisoned");
        let job = jobs.get_mut(job_id)?;
        let floor = job.progress;
        mutate(job);
        job.progress = job.progress.max(floor);
        job.updated_at = Utc::now();
        Some(job.clone())
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        self.jobs
            .lock()
            .expect("job map lock poisoned")
            .remove(job_id)
    }
}

/// identity → running job id. Checked before a job is created so duplicate
/// scans are rejected outright, never queued.
#[derive(Default)]
pub struct ScanRegistry {
    active: Mutex<HashMap<String, String>>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job_id` as the active scan for `user_id`. Returns false if
    /// another scan is already registered.
    pub fn try_register(&self, user_id: &str, job_id: &str) -> bool {
        let mut active = self.active.lock().expect("registry lock poisoned");
        if active.contains_key(user_id) {
            return false;
        }
        active.insert(user_id.to_string(), job_id.to_string());
        true
    }

    pub fn release(&self, user_id: &str) {
        self.active
            .lock()
            .expect("registry lock poisoned")
            .remove(user_id);
    }

    pub fn active_job(&self, user_id: &str) -> Option<String> {
        self.active
            .lock()
            .expect("registry lock poisoned")
            .get(user_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wire_names_match_contract() {
        let names: Vec<String> = [
            ScanStage::Pending,
            ScanStage::Fetching,
            ScanStage::Classifying,
            ScanStage::Saving,
            ScanStage::Completed,
            ScanStage::Error,
        ]
        .iter()
        .map(|s| serde_json::to_value(s).unwrap().as_str().unwrap().to_string())
        .collect();
        assert_eq!(
            names,
            vec!["pending", "fetching", "running", "saving", "completed", "error"]
        );
        // Display mirrors the wire names.
        assert_eq!(ScanStage::Classifying.to_string(), "running");
    }

    #[test]
    fn update_returns_snapshot_and_keeps_progress_monotonic() {
        let store = JobStore::new();
        store.create("j1", "42");

        store.update("j1", |j| j.progress = 30);
        let snap = store.update("j1", |j| j.progress = 10).unwrap();
        assert_eq!(snap.progress, 30);
    }

    #[test]
    fn missing_job_update_is_none() {
        let store = JobStore::new();
        assert!(store.update("nope", |j| j.progress = 1).is_none());
    }

    #[test]
    fn registry_rejects_second_registration() {
        let registry = ScanRegistry::new();
        assert!(registry.try_register("42", "job-a"));
        assert!(!registry.try_register("42", "job-b"));
        assert_eq!(registry.active_job("42").as_deref(), Some("job-a"));

        registry.release("42");
        assert!(registry.try_register("42", "job-c"));
    }

    #[test]
    fn terminal_stages() {
        assert!(ScanStage::Completed.is_terminal());
        assert!(ScanStage::Error.is_terminal());
        assert!(!ScanStage::Saving.is_terminal());
    }
}

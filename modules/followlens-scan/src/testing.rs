// Test mocks for the scan pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockSource (FollowingSource) — canned account list and handle map
// - MockModel (ClassificationModel) — scripted taxonomy, deterministic
//   assignments, call counters, optional injected failures
// - FailingStore (AccountStore) — MemoryStore wrapper that can fail writes
//
// Plus helpers for constructing Account / ClassifiedAccount / Taxonomy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use followlens_common::{
    Account, Category, ClassificationResult, ClassifiedAccount, Taxonomy,
};
use grok_client::GrokError;
use x_client::XApiError;

use crate::store::MemoryStore;
use crate::traits::{AccountStore, ClassificationModel, FollowingSource};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn account(id: &str) -> Account {
    Account {
        user_id: id.to_string(),
        handle: format!("user_{id}"),
        display_name: format!("User {id}"),
        bio: Some(format!("Bio for {id}")),
        verified: false,
        followers_count: 100,
        following_count: 50,
        post_count: 1000,
        location: None,
        website: None,
        avatar_url: None,
        created_at: None,
    }
}

pub fn accounts(n: usize) -> Vec<Account> {
    (1..=n).map(|i| account(&i.to_string())).collect()
}

pub fn taxonomy(names: &[&str]) -> Taxonomy {
    Taxonomy {
        categories: names
            .iter()
            .map(|name| Category {
                name: name.to_string(),
                description: format!("Accounts about {name}"),
                characteristics: vec![format!("{name}-ish")],
                estimated_percentage: 100.0 / names.len() as f64,
            })
            .collect(),
        analysis_summary: Some("test taxonomy".to_string()),
        discovered_at: Utc::now(),
    }
}

pub fn classified_days_ago(id: &str, category: &str, days: i64) -> ClassifiedAccount {
    ClassifiedAccount {
        account: account(id),
        category: category.to_string(),
        confidence: 0.9,
        reasoning: Some("seeded".to_string()),
        classified_at: Utc::now() - chrono::Duration::days(days),
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Canned identity source. Builder pattern: `.with_handle()`,
/// `.failing()`, `.with_delay()`.
pub struct MockSource {
    accounts: Vec<Account>,
    handles: HashMap<String, String>,
    fail_fetch: AtomicBool,
    delay: Option<Duration>,
}

impl MockSource {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            handles: HashMap::new(),
            fail_fetch: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_handle(mut self, handle: &str, user_id: &str) -> Self {
        self.handles.insert(handle.to_string(), user_id.to_string());
        self
    }

    pub fn failing(self) -> Self {
        self.fail_fetch.store(true, Ordering::SeqCst);
        self
    }

    /// Hold the fetch for `delay`, to keep a scan in flight while a test
    /// submits a second one.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl FollowingSource for MockSource {
    async fn fetch_all_following(&self, _user_id: &str) -> Result<Vec<Account>, XApiError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(XApiError::Network("simulated fetch failure".to_string()));
        }
        Ok(self.accounts.clone())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>, XApiError> {
        Ok(self.handles.get(handle).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

/// Scripted classification model. Assigns categories by cycling through the
/// taxonomy in batch order, which keeps assignments deterministic.
pub struct MockModel {
    taxonomy: Taxonomy,
    pub discover_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    fail_discover: AtomicBool,
    fail_classify: AtomicBool,
    short_by: AtomicUsize,
}

impl MockModel {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            discover_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            fail_discover: AtomicBool::new(false),
            fail_classify: AtomicBool::new(false),
            short_by: AtomicUsize::new(0),
        }
    }

    /// Return `n` fewer results than accounts on every classify call.
    pub fn short_by(self, n: usize) -> Self {
        self.short_by.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_discover(self) -> Self {
        self.fail_discover.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_classify(self) -> Self {
        self.fail_classify.store(true, Ordering::SeqCst);
        self
    }

    pub fn discover_count(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn classify_count(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationModel for MockModel {
    async fn discover(&self, _sample: &[Account]) -> Result<Taxonomy, GrokError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_discover.load(Ordering::SeqCst) {
            return Err(GrokError::Network("simulated discovery failure".to_string()));
        }
        Ok(self.taxonomy.clone())
    }

    async fn classify_batch(
        &self,
        accounts: &[Account],
        taxonomy: &Taxonomy,
    ) -> Result<Vec<ClassificationResult>, GrokError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_classify.load(Ordering::SeqCst) {
            return Err(GrokError::Network(
                "simulated classification failure".to_string(),
            ));
        }
        let returned = accounts
            .len()
            .saturating_sub(self.short_by.load(Ordering::SeqCst));
        Ok(accounts
            .iter()
            .take(returned)
            .enumerate()
            .map(|(i, _)| ClassificationResult {
                category: taxonomy.categories[i % taxonomy.categories.len()]
                    .name
                    .clone(),
                confidence: 0.9,
                reasoning: "mock assignment".to_string(),
                alternative: None,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// MemoryStore wrapper whose account writes can be made to fail, for
/// exercising the saving-stage failure path.
pub struct FailingStore {
    inner: MemoryStore,
    fail_account_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_account_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_account_writes(self) -> Self {
        self.fail_account_writes.store(true, Ordering::SeqCst);
        self
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for FailingStore {
    async fn upsert_accounts(&self, accounts: &[ClassifiedAccount]) -> Result<()> {
        if self.fail_account_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        self.inner.upsert_accounts(accounts).await
    }

    async fn upsert_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        self.inner.upsert_taxonomy(taxonomy).await
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<HashMap<String, ClassifiedAccount>> {
        self.inner.fetch_by_ids(ids).await
    }

    async fn fetch_all(&self) -> Result<Vec<ClassifiedAccount>> {
        self.inner.fetch_all().await
    }

    async fn fetch_taxonomy(&self) -> Result<Option<Taxonomy>> {
        self.inner.fetch_taxonomy().await
    }
}

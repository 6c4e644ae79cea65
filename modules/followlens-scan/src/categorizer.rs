//! Categorization orchestration: the two-phase discover→classify algorithm
//! with partial-cache-aware re-entry.
//!
//! Full mode discovers a taxonomy from a bounded sample and classifies the
//! entire input against it. Incremental mode reuses the stored taxonomy,
//! classifies only accounts the cache partitioner marks pending, and merges
//! the result back into the caller's input order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use followlens_common::{Account, ClassifiedAccount, Taxonomy};

use crate::cache::CachePartitioner;
use crate::error::ScanError;
use crate::traits::{AccountStore, ClassificationModel};

/// Progress callback: (accounts processed so far, total). Invoked at least
/// every ten processed accounts and at set completion; fresh-cached
/// accounts count as processed up front.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

fn no_progress(_: usize, _: usize) {}

#[derive(Debug)]
pub struct CategorizationOutcome {
    pub taxonomy: Taxonomy,
    /// One record per input account, in input order.
    pub accounts: Vec<ClassifiedAccount>,
    pub from_cache: usize,
    pub newly_classified: usize,
}

pub struct Categorizer {
    model: Arc<dyn ClassificationModel>,
    store: Arc<dyn AccountStore>,
    partitioner: CachePartitioner,
    batch_size: usize,
    sample_cap: usize,
}

impl Categorizer {
    pub fn new(
        model: Arc<dyn ClassificationModel>,
        store: Arc<dyn AccountStore>,
        freshness_window: Duration,
    ) -> Self {
        let partitioner = CachePartitioner::new(store.clone(), freshness_window);
        Self {
            model,
            store,
            partitioner,
            batch_size: grok_client::CLASSIFICATION_BATCH_SIZE,
            sample_cap: grok_client::DISCOVERY_SAMPLE_CAP,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Produce a taxonomy and one classified record per input account.
    ///
    /// With a usable stored taxonomy and `force_refresh` off, only
    /// stale-or-missing accounts hit the model; an all-fresh input issues
    /// zero model calls. Otherwise a full discover→classify run happens and
    /// the cache is ignored.
    pub async fn categorize(
        &self,
        accounts: &[Account],
        force_refresh: bool,
        progress: ProgressFn<'_>,
    ) -> Result<CategorizationOutcome, ScanError> {
        if accounts.is_empty() {
            return Err(ScanError::Validation(
                "no accounts provided for categorization".to_string(),
            ));
        }

        let stored = self
            .store
            .fetch_taxonomy()
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        match stored {
            Some(taxonomy) if !force_refresh && !taxonomy.is_empty() => {
                self.incremental(accounts, taxonomy, progress).await
            }
            _ => self.full(accounts, progress).await,
        }
    }

    /// Convenience wrapper for callers that do not track progress.
    pub async fn categorize_silent(
        &self,
        accounts: &[Account],
        force_refresh: bool,
    ) -> Result<CategorizationOutcome, ScanError> {
        self.categorize(accounts, force_refresh, &no_progress).await
    }

    async fn full(
        &self,
        accounts: &[Account],
        progress: ProgressFn<'_>,
    ) -> Result<CategorizationOutcome, ScanError> {
        let sample = &accounts[..accounts.len().min(self.sample_cap)];
        info!(
            total = accounts.len(),
            sample = sample.len(),
            "Discovering taxonomy from sample"
        );

        let taxonomy = self.model.discover(sample).await?;
        self.store
            .upsert_taxonomy(&taxonomy)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        // The sample is classified along with everything else: discovery
        // output carries no per-account assignments.
        let classified = self
            .classify_all(accounts, &taxonomy, 0, accounts.len(), progress)
            .await?;

        Ok(CategorizationOutcome {
            taxonomy,
            from_cache: 0,
            newly_classified: classified.len(),
            accounts: classified,
        })
    }

    async fn incremental(
        &self,
        accounts: &[Account],
        taxonomy: Taxonomy,
        progress: ProgressFn<'_>,
    ) -> Result<CategorizationOutcome, ScanError> {
        let partition = self
            .partitioner
            .partition(accounts)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        let total = accounts.len();
        let from_cache = partition.fresh.len();
        debug!(from_cache, pending = partition.pending.len(), "Cache partition");

        if from_cache > 0 {
            progress(from_cache, total);
        }

        let newly = if partition.pending.is_empty() {
            Vec::new()
        } else {
            self.classify_all(&partition.pending, &taxonomy, from_cache, total, progress)
                .await?
        };
        let newly_classified = newly.len();

        // Merge, then re-sort into the caller's input order by id so the
        // output never betrays which path produced each record.
        let mut by_id: HashMap<String, ClassifiedAccount> = partition
            .fresh
            .into_iter()
            .chain(newly)
            .map(|c| (c.user_id().to_string(), c))
            .collect();
        let merged: Vec<ClassifiedAccount> = accounts
            .iter()
            .filter_map(|a| by_id.remove(&a.user_id))
            .collect();

        Ok(CategorizationOutcome {
            taxonomy,
            accounts: merged,
            from_cache,
            newly_classified,
        })
    }

    async fn classify_all(
        &self,
        accounts: &[Account],
        taxonomy: &Taxonomy,
        processed_offset: usize,
        total: usize,
        progress: ProgressFn<'_>,
    ) -> Result<Vec<ClassifiedAccount>, ScanError> {
        let mut classified = Vec::with_capacity(accounts.len());

        for batch in accounts.chunks(self.batch_size) {
            let results = self.model.classify_batch(batch, taxonomy).await?;

            // Pairing is positional; a short result list leaves the tail of
            // the batch unclassified for this run.
            if results.len() < batch.len() {
                let dropped: Vec<&str> = batch[results.len()..]
                    .iter()
                    .map(|a| a.user_id.as_str())
                    .collect();
                warn!(
                    batch = batch.len(),
                    received = results.len(),
                    ?dropped,
                    "Batch under-delivered, accounts left unclassified"
                );
            }

            for (account, result) in batch.iter().zip(results.iter()) {
                classified.push(ClassifiedAccount::from_result(account.clone(), result));

                let done = processed_offset + classified.len();
                if done % 10 == 0 || classified.len() == accounts.len() {
                    progress(done, total);
                }
            }
        }

        Ok(classified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::*;
    use std::sync::Mutex;

    fn categorizer(model: Arc<MockModel>, store: Arc<MemoryStore>) -> Categorizer {
        Categorizer::new(model, store, Duration::days(7))
    }

    #[tokio::test]
    async fn full_run_discovers_and_classifies_everything() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech", "News"])));
        let store = Arc::new(MemoryStore::new());
        let input = accounts(3);

        let outcome = categorizer(model.clone(), store.clone())
            .categorize_silent(&input, false)
            .await
            .unwrap();

        assert_eq!(model.discover_count(), 1);
        assert_eq!(outcome.accounts.len(), 3);
        assert_eq!(outcome.from_cache, 0);
        assert_eq!(outcome.taxonomy.categories.len(), 2);
        // Discovery output is persisted before classification starts.
        assert!(store.fetch_taxonomy().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn all_fresh_input_issues_zero_model_calls() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech", "News"]));
        store.seed_account(classified_days_ago("1", "Tech", 1));
        store.seed_account(classified_days_ago("2", "News", 2));

        let input = vec![account("1"), account("2")];
        let outcome = categorizer(model.clone(), store)
            .categorize_silent(&input, false)
            .await
            .unwrap();

        assert_eq!(model.discover_count(), 0);
        assert_eq!(model.classify_count(), 0);
        assert_eq!(outcome.from_cache, 2);
        assert_eq!(outcome.accounts[0].category, "Tech");
        assert_eq!(outcome.accounts[1].category, "News");
    }

    #[tokio::test]
    async fn merged_output_preserves_input_order() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech"]));
        // b is cached fresh; a and c need classification.
        store.seed_account(classified_days_ago("b", "Tech", 1));

        let input = vec![account("a"), account("b"), account("c")];
        let outcome = categorizer(model.clone(), store)
            .categorize_silent(&input, false)
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.accounts.iter().map(|c| c.user_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(outcome.from_cache, 1);
        assert_eq!(outcome.newly_classified, 2);
    }

    #[tokio::test]
    async fn stale_entry_is_reclassified_and_superseded() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech"]));
        let stale = classified_days_ago("1", "OldCategory", 10);
        let old_stamp = stale.classified_at;
        store.seed_account(stale);

        let outcome = categorizer(model.clone(), store)
            .categorize_silent(&[account("1")], false)
            .await
            .unwrap();

        assert_eq!(model.classify_count(), 1);
        assert_eq!(outcome.accounts[0].category, "Tech");
        assert!(outcome.accounts[0].classified_at > old_stamp);
    }

    #[tokio::test]
    async fn force_refresh_ignores_cache_and_rediscovers() {
        let model = Arc::new(MockModel::new(taxonomy(&["Fresh"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Stale"]));
        store.seed_account(classified_days_ago("1", "Stale", 0));

        let outcome = categorizer(model.clone(), store.clone())
            .categorize_silent(&[account("1")], true)
            .await
            .unwrap();

        assert_eq!(model.discover_count(), 1);
        assert_eq!(outcome.taxonomy.categories[0].name, "Fresh");
        // Re-discovery replaces the stored taxonomy wholesale.
        let stored = store.fetch_taxonomy().await.unwrap().unwrap();
        assert_eq!(stored.categories[0].name, "Fresh");
    }

    #[tokio::test]
    async fn empty_input_is_a_validation_error() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        let err = categorizer(model, store)
            .categorize_silent(&[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[tokio::test]
    async fn batches_are_split_by_batch_size() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech"]));

        let input = accounts(5);
        Categorizer::new(model.clone(), store, Duration::days(7))
            .with_batch_size(2)
            .categorize_silent(&input, false)
            .await
            .unwrap();

        // 5 accounts at batch size 2 → 3 calls.
        assert_eq!(model.classify_count(), 3);
    }

    #[tokio::test]
    async fn under_delivered_batch_drops_only_the_unpaired_tail() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])).short_by(1));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech"]));

        let input = accounts(3);
        let outcome = categorizer(model, store)
            .categorize_silent(&input, false)
            .await
            .unwrap();

        // Pairing is positional, so the shortfall lands on the last account.
        assert_eq!(outcome.accounts.len(), 2);
        assert_eq!(outcome.newly_classified, 2);
        let ids: Vec<&str> = outcome.accounts.iter().map(|c| c.user_id()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn progress_reports_every_ten_and_at_completion() {
        let model = Arc::new(MockModel::new(taxonomy(&["Tech"])));
        let store = Arc::new(MemoryStore::new());
        store.seed_taxonomy(taxonomy(&["Tech"]));

        let seen: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
        let input = accounts(25);
        categorizer(model, store)
            .categorize(&input, false, &|done, total| {
                seen.lock().unwrap().push((done, total));
            })
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&(10, 25)));
        assert!(seen.contains(&(20, 25)));
        assert_eq!(*seen.last().unwrap(), (25, 25));
        // Monotonic.
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}

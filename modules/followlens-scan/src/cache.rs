//! Cache partitioning: split a requested account set into fresh-cached and
//! needs-classification, by per-account classified-at timestamp.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};

use followlens_common::{Account, ClassifiedAccount};

use crate::traits::AccountStore;

/// Default freshness window for cached classifications.
pub const DEFAULT_FRESHNESS_DAYS: i64 = 7;

/// Disjoint split of one requested account set. Relative input order is
/// preserved within each list.
#[derive(Debug)]
pub struct CachePartition {
    pub fresh: Vec<ClassifiedAccount>,
    pub pending: Vec<Account>,
}

pub struct CachePartitioner {
    store: Arc<dyn AccountStore>,
    window: Duration,
}

impl CachePartitioner {
    pub fn new(store: Arc<dyn AccountStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Split `accounts` into fresh-cached and stale-or-missing. Looks up
    /// only the requested ids; a missing id is never an error, it just
    /// lands in `pending`.
    pub async fn partition(&self, accounts: &[Account]) -> Result<CachePartition> {
        if accounts.is_empty() {
            return Ok(CachePartition {
                fresh: Vec::new(),
                pending: Vec::new(),
            });
        }

        let ids: Vec<String> = accounts.iter().map(|a| a.user_id.clone()).collect();
        let cached = self.store.fetch_by_ids(&ids).await?;
        let now = Utc::now();

        let mut fresh = Vec::new();
        let mut pending = Vec::new();
        for account in accounts {
            match cached.get(&account.user_id) {
                Some(hit) if hit.is_fresh(now, self.window) => fresh.push(hit.clone()),
                _ => pending.push(account.clone()),
            }
        }

        Ok(CachePartition { fresh, pending })
    }
}

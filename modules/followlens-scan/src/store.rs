//! In-memory `AccountStore` implementation.
//!
//! Backs the binary and the tests. Durable storage is a collaborator
//! concern; anything that satisfies `AccountStore` can replace this.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use followlens_common::{ClassifiedAccount, Taxonomy};

use crate::traits::AccountStore;

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, ClassifiedAccount>>,
    taxonomy: RwLock<Option<Taxonomy>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a classified account, for seeding caches in tests.
    pub fn seed_account(&self, account: ClassifiedAccount) {
        self.accounts
            .write()
            .expect("account map lock poisoned")
            .insert(account.user_id().to_string(), account);
    }

    pub fn seed_taxonomy(&self, taxonomy: Taxonomy) {
        *self.taxonomy.write().expect("taxonomy lock poisoned") = Some(taxonomy);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().expect("account map lock poisoned").len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn upsert_accounts(&self, accounts: &[ClassifiedAccount]) -> Result<()> {
        let mut map = self.accounts.write().expect("account map lock poisoned");
        for account in accounts {
            map.insert(account.user_id().to_string(), account.clone());
        }
        Ok(())
    }

    async fn upsert_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        *self.taxonomy.write().expect("taxonomy lock poisoned") = Some(taxonomy.clone());
        Ok(())
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<HashMap<String, ClassifiedAccount>> {
        let map = self.accounts.read().expect("account map lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id).map(|a| (id.clone(), a.clone())))
            .collect())
    }

    async fn fetch_all(&self) -> Result<Vec<ClassifiedAccount>> {
        let map = self.accounts.read().expect("account map lock poisoned");
        Ok(map.values().cloned().collect())
    }

    async fn fetch_taxonomy(&self) -> Result<Option<Taxonomy>> {
        Ok(self.taxonomy.read().expect("taxonomy lock poisoned").clone())
    }
}

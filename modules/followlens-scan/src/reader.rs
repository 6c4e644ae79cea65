//! Read-side account queries over the store: filtering, search, rankings.
//!
//! Pure functions of `AccountStore::fetch_all`; no scan state involved.

use std::sync::Arc;

use anyhow::Result;

use followlens_common::ClassifiedAccount;

use crate::traits::AccountStore;

/// Conjunctive filter criteria for stored accounts.
#[derive(Debug, Default, Clone)]
pub struct AccountFilter {
    pub category: Option<String>,
    pub verified_only: bool,
    pub min_followers: Option<u64>,
}

pub struct AccountReader {
    store: Arc<dyn AccountStore>,
}

impl AccountReader {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Accounts matching every criterion in `filter`. An empty filter
    /// returns everything.
    pub async fn filter(&self, filter: &AccountFilter) -> Result<Vec<ClassifiedAccount>> {
        let mut accounts = self.store.fetch_all().await?;
        if let Some(category) = &filter.category {
            accounts.retain(|c| &c.category == category);
        }
        if filter.verified_only {
            accounts.retain(|c| c.account.verified);
        }
        if let Some(min) = filter.min_followers {
            accounts.retain(|c| c.account.followers_count >= min);
        }
        Ok(accounts)
    }

    /// Look up one account by its handle.
    pub async fn by_handle(&self, handle: &str) -> Result<Option<ClassifiedAccount>> {
        let accounts = self.store.fetch_all().await?;
        Ok(accounts.into_iter().find(|c| c.account.handle == handle))
    }

    /// Case-insensitive substring search over handle and display name.
    pub async fn search(&self, term: &str) -> Result<Vec<ClassifiedAccount>> {
        let needle = term.to_lowercase();
        let mut accounts = self.store.fetch_all().await?;
        accounts.retain(|c| {
            c.account.handle.to_lowercase().contains(&needle)
                || c.account.display_name.to_lowercase().contains(&needle)
        });
        Ok(accounts)
    }

    /// The `limit` accounts with the most followers, optionally within one
    /// category, sorted descending.
    pub async fn top_by_followers(
        &self,
        limit: usize,
        category: Option<&str>,
    ) -> Result<Vec<ClassifiedAccount>> {
        let mut accounts = self.store.fetch_all().await?;
        if let Some(category) = category {
            accounts.retain(|c| c.category == category);
        }
        accounts.sort_by(|a, b| b.account.followers_count.cmp(&a.account.followers_count));
        accounts.truncate(limit);
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::classified_days_ago;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut alice = classified_days_ago("1", "Tech", 1);
        alice.account.handle = "alice".to_string();
        alice.account.display_name = "Alice Compiler".to_string();
        alice.account.verified = true;
        alice.account.followers_count = 5000;
        store.seed_account(alice);

        let mut bob = classified_days_ago("2", "Tech", 1);
        bob.account.handle = "bob".to_string();
        bob.account.display_name = "Bob".to_string();
        bob.account.followers_count = 300;
        store.seed_account(bob);

        let mut carol = classified_days_ago("3", "News", 1);
        carol.account.handle = "carol".to_string();
        carol.account.display_name = "Carol Anchor".to_string();
        carol.account.verified = true;
        carol.account.followers_count = 900;
        store.seed_account(carol);

        store
    }

    #[tokio::test]
    async fn empty_filter_returns_everything() {
        let reader = AccountReader::new(seeded_store());
        let all = reader.filter(&AccountFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn filter_criteria_are_conjunctive() {
        let reader = AccountReader::new(seeded_store());
        let hits = reader
            .filter(&AccountFilter {
                category: Some("Tech".to_string()),
                verified_only: true,
                min_followers: Some(1000),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].account.handle, "alice");
    }

    #[tokio::test]
    async fn min_followers_is_inclusive() {
        let reader = AccountReader::new(seeded_store());
        let hits = reader
            .filter(&AccountFilter {
                min_followers: Some(900),
                ..AccountFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn by_handle_finds_exact_match_or_none() {
        let reader = AccountReader::new(seeded_store());
        let hit = reader.by_handle("bob").await.unwrap();
        assert_eq!(hit.unwrap().user_id(), "2");
        assert!(reader.by_handle("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_handle_and_display_name_case_insensitively() {
        let reader = AccountReader::new(seeded_store());

        let by_handle = reader.search("ALICE").await.unwrap();
        assert_eq!(by_handle.len(), 1);

        // "Anchor" only appears in carol's display name.
        let by_name = reader.search("anchor").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].account.handle, "carol");
    }

    #[tokio::test]
    async fn top_by_followers_sorts_descending_and_truncates() {
        let reader = AccountReader::new(seeded_store());

        let top = reader.top_by_followers(2, None).await.unwrap();
        let handles: Vec<&str> = top.iter().map(|c| c.account.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "carol"]);

        let top_tech = reader.top_by_followers(10, Some("Tech")).await.unwrap();
        let handles: Vec<&str> = top_tech.iter().map(|c| c.account.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "bob"]);
    }
}

// Trait abstractions for the scan pipeline's three collaborators.
//
// FollowingSource — the identity source (X API) behind one trait.
// ClassificationModel — taxonomy discovery and batch classification.
// AccountStore — persisted classified accounts and the taxonomy.
//
// These enable deterministic testing with MockSource, MockModel and the
// in-memory store: no network, no API keys. `cargo test` in seconds.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use followlens_common::{Account, ClassificationResult, ClassifiedAccount, Taxonomy};
use grok_client::{GrokClient, GrokError};
use x_client::{XApiError, XClient};

// ---------------------------------------------------------------------------
// FollowingSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FollowingSource: Send + Sync {
    /// Fetch every account the identity follows, pagination handled
    /// internally.
    async fn fetch_all_following(&self, user_id: &str) -> Result<Vec<Account>, XApiError>;

    /// Resolve a handle to a user id. `None` when the handle does not exist.
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>, XApiError>;
}

#[async_trait]
impl FollowingSource for XClient {
    async fn fetch_all_following(&self, user_id: &str) -> Result<Vec<Account>, XApiError> {
        XClient::fetch_all_following(self, user_id).await
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>, XApiError> {
        XClient::resolve_handle(self, handle).await
    }
}

// ---------------------------------------------------------------------------
// ClassificationModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ClassificationModel: Send + Sync {
    /// Discover an emergent taxonomy from a sample of accounts. Raised
    /// errors have already exhausted the client's internal retries.
    async fn discover(&self, sample: &[Account]) -> Result<Taxonomy, GrokError>;

    /// Classify one batch against a taxonomy; results pair positionally
    /// with the batch.
    async fn classify_batch(
        &self,
        accounts: &[Account],
        taxonomy: &Taxonomy,
    ) -> Result<Vec<ClassificationResult>, GrokError>;
}

#[async_trait]
impl ClassificationModel for GrokClient {
    async fn discover(&self, sample: &[Account]) -> Result<Taxonomy, GrokError> {
        GrokClient::discover(self, sample).await
    }

    async fn classify_batch(
        &self,
        accounts: &[Account],
        taxonomy: &Taxonomy,
    ) -> Result<Vec<ClassificationResult>, GrokError> {
        GrokClient::classify_batch(self, accounts, taxonomy).await
    }
}

// ---------------------------------------------------------------------------
// AccountStore
// ---------------------------------------------------------------------------

/// Key-value persistence for classified accounts (keyed by user id,
/// last-write-wins) and the taxonomy. Externally synchronized; the core
/// issues whole-batch upserts only.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn upsert_accounts(&self, accounts: &[ClassifiedAccount]) -> Result<()>;

    async fn upsert_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()>;

    /// Fetch only the requested ids. Missing ids are simply absent from the
    /// returned map.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<HashMap<String, ClassifiedAccount>>;

    async fn fetch_all(&self) -> Result<Vec<ClassifiedAccount>>;

    async fn fetch_taxonomy(&self) -> Result<Option<Taxonomy>>;
}

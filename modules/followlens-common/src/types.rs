use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Accounts ---

/// A followed account as returned by the identity source. Immutable once
/// fetched; classification never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    pub user_id: String,
    pub handle: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub post_count: u64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An account plus its model-assigned category. One per input account;
/// re-classification produces a new record that supersedes the old one
/// for the same `user_id` (last-write-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifiedAccount {
    #[serde(flatten)]
    pub account: Account,
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub classified_at: DateTime<Utc>,
}

impl ClassifiedAccount {
    /// Combine an account with a classification result, stamping it with
    /// the current time. Confidence is clamped into [0.0, 1.0].
    pub fn from_result(account: Account, result: &ClassificationResult) -> Self {
        Self {
            account,
            category: result.category.clone(),
            confidence: result.confidence.clamp(0.0, 1.0),
            reasoning: if result.reasoning.is_empty() {
                None
            } else {
                Some(result.reasoning.clone())
            },
            classified_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.account.user_id
    }

    /// Whether this record was classified within `window` of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.classified_at > now - window
    }
}

// --- Taxonomy ---

/// One discovered category. `estimated_percentage` is the model's own
/// estimate and is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub estimated_percentage: f64,
}

/// The emergent category set discovered for one network. Re-discovery
/// replaces the whole taxonomy (last-write-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Taxonomy {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub analysis_summary: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl Taxonomy {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }
}

// --- Classification results ---

/// Per-account output of one batch classification call. Pairs positionally
/// with the batch that was sent. `alternative` is accepted from the model
/// when confidence < 0.8 but is not stored beyond this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationResult {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub alternative: Option<String>,
}

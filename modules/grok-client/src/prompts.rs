//! Prompt construction for discovery and batch classification.

use std::fmt::Write;

use followlens_common::{Account, Taxonomy};

pub(crate) const DISCOVERY_SYSTEM: &str =
    "You are a social network analysis expert who discovers natural patterns in data.";

pub(crate) const CLASSIFY_SYSTEM: &str =
    "You categorize accounts accurately based on discovered patterns.";

/// How many sampled accounts are rendered into the discovery prompt.
const DISCOVERY_PROMPT_ACCOUNTS: usize = 100;

/// Build the taxonomy-discovery prompt. The instruction not to use any
/// predefined taxonomy is the point: the grouping must emerge from the
/// observed accounts.
pub(crate) fn discovery_prompt(sample: &[Account]) -> String {
    let shown = sample.len().min(DISCOVERY_PROMPT_ACCOUNTS);
    let mut listing = String::new();
    for account in &sample[..shown] {
        let _ = writeln!(
            listing,
            "@{}: {} ({} followers)",
            account.handle,
            account.bio.as_deref().unwrap_or("No bio"),
            account.followers_count,
        );
    }
    let remainder = if sample.len() > shown {
        format!("... and {} more accounts\n", sample.len() - shown)
    } else {
        String::new()
    };

    format!(
        r#"I have {count} followed accounts from one social network. Analyze them and discover 10-20 natural categories based on actual patterns in the data.

Accounts (handle: bio, followers):
{listing}{remainder}
Your task:
1. Identify natural groupings and communities
2. Create 10-20 descriptive category names
3. Explain key characteristics of each category
4. Estimate the percentage of accounts in each

DO NOT use predefined categories. Discover what is actually in THIS network.

Respond with JSON:
{{
  "categories": [
    {{
      "name": "Descriptive Category Name",
      "description": "What defines this category",
      "characteristics": ["trait 1", "trait 2", "trait 3"],
      "estimated_percentage": 15
    }}
  ],
  "total_categories": 12,
  "analysis_summary": "Brief overview of the network"
}}"#,
        count = sample.len(),
    )
}

/// Build the batch-classification prompt: a 1-indexed account listing plus
/// the discovered category names and descriptions.
pub(crate) fn classify_prompt(accounts: &[Account], taxonomy: &Taxonomy) -> String {
    let mut listing = String::new();
    for (idx, account) in accounts.iter().enumerate() {
        let _ = writeln!(
            listing,
            "{}. @{} ({})\n   Bio: {}\n   Followers: {} | Following: {} | Verified: {} | Posts: {}",
            idx + 1,
            account.handle,
            account.display_name,
            account.bio.as_deref().unwrap_or("N/A"),
            account.followers_count,
            account.following_count,
            account.verified,
            account.post_count,
        );
    }

    let mut descriptions = String::new();
    for category in &taxonomy.categories {
        let _ = writeln!(descriptions, "- {}: {}", category.name, category.description);
    }

    format!(
        r#"Categorize these accounts using the discovered category system.

Available categories:
{names}

Category descriptions:
{descriptions}
Accounts to categorize:
{listing}
For each account, provide:
- Primary category (must be from the list above)
- Confidence (0.0 to 1.0)
- Brief reasoning
- Alternative category if confidence < 0.8

Respond as JSON array:
[
  {{
    "account_index": 1,
    "category": "Category Name",
    "confidence": 0.95,
    "reasoning": "Why this category fits",
    "alternative": null
  }}
]"#,
        names = taxonomy.names().join(", "),
    )
}

//! Aggregate statistics over stored classified accounts.
//!
//! Everything here is computed from a full store read at call time; per the
//! store sizes involved (a following list) that is cheap enough that no
//! rollup state is kept.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use followlens_common::ClassifiedAccount;

use crate::traits::AccountStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallStatistics {
    pub total_accounts: usize,
    pub total_categories: usize,
    pub verified_count: usize,
    /// Percentage of accounts that are verified.
    pub verification_rate: f64,
    pub avg_followers: f64,
    pub avg_following: f64,
    pub avg_posts: f64,
    pub total_followers: u64,
    pub total_following: u64,
    pub total_posts: u64,
    pub most_popular_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub category: String,
    pub account_count: usize,
    /// Share of all stored accounts, as a percentage.
    pub percentage: f64,
    pub avg_followers: f64,
    pub verification_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngagementMetrics {
    pub avg_follower_following_ratio: f64,
    /// Posts per 1000 followers, averaged across accounts.
    pub avg_posts_per_follower: f64,
    pub median_followers: u64,
    pub median_following: u64,
}

pub struct StatisticsReader {
    store: Arc<dyn AccountStore>,
}

impl StatisticsReader {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Totals, averages and the most popular category across the whole
    /// store. An empty store yields all-zero statistics, not an error.
    pub async fn overall(&self) -> Result<OverallStatistics> {
        let accounts = self.store.fetch_all().await?;
        let total_categories = self
            .store
            .fetch_taxonomy()
            .await?
            .map(|t| t.categories.len())
            .unwrap_or(0);

        if accounts.is_empty() {
            return Ok(OverallStatistics {
                total_categories,
                ..OverallStatistics::default()
            });
        }

        let total = accounts.len();
        let verified_count = accounts.iter().filter(|c| c.account.verified).count();
        let total_followers: u64 = accounts.iter().map(|c| c.account.followers_count).sum();
        let total_following: u64 = accounts.iter().map(|c| c.account.following_count).sum();
        let total_posts: u64 = accounts.iter().map(|c| c.account.post_count).sum();

        let mut category_counts: HashMap<&str, usize> = HashMap::new();
        for classified in &accounts {
            *category_counts.entry(classified.category.as_str()).or_default() += 1;
        }
        let most_popular_category = category_counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(name, _)| name.to_string());

        Ok(OverallStatistics {
            total_accounts: total,
            total_categories,
            verified_count,
            verification_rate: verified_count as f64 / total as f64 * 100.0,
            avg_followers: total_followers as f64 / total as f64,
            avg_following: total_following as f64 / total as f64,
            avg_posts: total_posts as f64 / total as f64,
            total_followers,
            total_following,
            total_posts,
            most_popular_category,
        })
    }

    /// Per-category breakdown for the discovered taxonomy, sorted by
    /// account count descending. Categories with no stored accounts are
    /// omitted; labels outside the taxonomy are not listed.
    pub async fn per_category(&self) -> Result<Vec<CategoryStatistics>> {
        let accounts = self.store.fetch_all().await?;
        let Some(taxonomy) = self.store.fetch_taxonomy().await? else {
            return Ok(Vec::new());
        };
        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let total = accounts.len();
        let mut stats: Vec<CategoryStatistics> = taxonomy
            .categories
            .iter()
            .filter_map(|category| {
                let members: Vec<&ClassifiedAccount> = accounts
                    .iter()
                    .filter(|c| c.category == category.name)
                    .collect();
                if members.is_empty() {
                    return None;
                }

                let count = members.len();
                let verified = members.iter().filter(|c| c.account.verified).count();
                let followers: u64 = members.iter().map(|c| c.account.followers_count).sum();

                Some(CategoryStatistics {
                    category: category.name.clone(),
                    account_count: count,
                    percentage: count as f64 / total as f64 * 100.0,
                    avg_followers: followers as f64 / count as f64,
                    verification_rate: verified as f64 / count as f64 * 100.0,
                })
            })
            .collect();

        stats.sort_by(|a, b| b.account_count.cmp(&a.account_count));
        Ok(stats)
    }

    /// Ratio and median engagement metrics. Zero denominators are floored
    /// to one so a zero-following or zero-follower account cannot blow up
    /// the averages.
    pub async fn engagement(&self) -> Result<EngagementMetrics> {
        let accounts = self.store.fetch_all().await?;
        if accounts.is_empty() {
            return Ok(EngagementMetrics::default());
        }

        let count = accounts.len() as f64;
        let ratio_sum: f64 = accounts
            .iter()
            .map(|c| c.account.followers_count as f64 / c.account.following_count.max(1) as f64)
            .sum();
        let posts_per_follower_sum: f64 = accounts
            .iter()
            .map(|c| c.account.post_count as f64 / c.account.followers_count.max(1) as f64 * 1000.0)
            .sum();

        let mut followers: Vec<u64> = accounts.iter().map(|c| c.account.followers_count).collect();
        let mut following: Vec<u64> = accounts.iter().map(|c| c.account.following_count).collect();
        followers.sort_unstable();
        following.sort_unstable();
        let mid = accounts.len() / 2;

        Ok(EngagementMetrics {
            avg_follower_following_ratio: ratio_sum / count,
            avg_posts_per_follower: posts_per_follower_sum / count,
            median_followers: followers[mid],
            median_following: following[mid],
        })
    }
}

pub mod error;
pub mod types;

pub use error::{Result, XApiError};
pub use types::{FollowingResponse, PageMeta, PublicMetrics, UserData, UserResponse};

use std::time::Duration;

use followlens_common::Account;

const BASE_URL: &str = "https://api.twitter.com/2";

/// Field projection requested for every user payload.
const USER_FIELDS: &str = "id,username,name,description,verified,created_at,\
                           public_metrics,location,url,profile_image_url";

/// Max results per following page allowed by the API.
const MAX_PAGE_SIZE: u32 = 1000;

/// Per-request timeout. A hung connection must not wedge a scan.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Polite delay between paginated requests.
const PAGE_DELAY: Duration = Duration::from_secs(1);

pub struct XClient {
    client: reqwest::Client,
    bearer_token: String,
    base_url: String,
}

impl XClient {
    pub fn new(bearer_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            bearer_token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Fetch one page of accounts a user follows. Returns the page plus the
    /// pagination token for the next page, if any.
    pub async fn get_following(
        &self,
        user_id: &str,
        pagination_token: Option<&str>,
    ) -> Result<(Vec<Account>, Option<String>)> {
        let url = format!("{}/users/{}/following", self.base_url, user_id);

        let mut params = vec![
            ("max_results", MAX_PAGE_SIZE.to_string()),
            ("user.fields", USER_FIELDS.to_string()),
        ];
        if let Some(token) = pagination_token {
            params.push(("pagination_token", token.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.map_status_error(status, resp, user_id).await);
        }

        let page: FollowingResponse = resp.json().await?;
        let accounts = page.data.into_iter().map(Account::from).collect();
        Ok((accounts, page.meta.next_token))
    }

    /// Fetch all accounts a user follows, walking pagination to the end with
    /// a polite delay between pages.
    pub async fn fetch_all_following(&self, user_id: &str) -> Result<Vec<Account>> {
        let mut all_accounts: Vec<Account> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let (accounts, token) = self.get_following(user_id, next_token.as_deref()).await?;
            all_accounts.extend(accounts);

            match token {
                Some(t) => {
                    next_token = Some(t);
                    tokio::time::sleep(PAGE_DELAY).await;
                }
                None => break,
            }
        }

        tracing::info!(user_id, count = all_accounts.len(), "Fetched following list");
        Ok(all_accounts)
    }

    /// Resolve a handle (without the `@`) to a user id. `None` when the
    /// handle does not exist.
    pub async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        let url = format!("{}/users/by/username/{}", self.base_url, handle);

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.bearer_token)
            .query(&[("user.fields", USER_FIELDS)])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.map_status_error(status, resp, handle).await);
        }

        let user: UserResponse = resp.json().await?;
        Ok(user.data.map(|u| u.id))
    }

    async fn map_status_error(
        &self,
        status: reqwest::StatusCode,
        resp: reqwest::Response,
        subject: &str,
    ) -> XApiError {
        match status.as_u16() {
            429 => {
                let reset = resp
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string();
                XApiError::RateLimited { reset }
            }
            401 => XApiError::Unauthorized,
            404 => XApiError::NotFound(subject.to_string()),
            _ => {
                let message = resp.text().await.unwrap_or_default();
                XApiError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

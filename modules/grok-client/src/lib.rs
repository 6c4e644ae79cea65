pub mod error;
mod prompts;
pub mod response;
pub mod retry;
pub(crate) mod types;
pub mod util;

pub use error::{GrokError, Result};
pub use retry::RetryPolicy;

use std::time::Duration;

use tracing::debug;

use followlens_common::{Account, ClassificationResult, Taxonomy};

use types::{ChatMessage, ChatRequest, ChatResponse};

const GROK_API_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "grok-beta";

/// Cap on the number of accounts sampled for taxonomy discovery.
pub const DISCOVERY_SAMPLE_CAP: usize = 200;

/// Accounts per classification call.
pub const CLASSIFICATION_BATCH_SIZE: usize = 50;

/// Per-request timeout. A hung completion call must not wedge a scan.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GrokClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GrokClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: GROK_API_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Discover 10-20 emergent categories from a sample of accounts.
    /// Retries communication and parse failures; a well-formed response of
    /// the wrong shape surfaces immediately.
    pub async fn discover(&self, sample: &[Account]) -> Result<Taxonomy> {
        let sample = &sample[..sample.len().min(DISCOVERY_SAMPLE_CAP)];
        let prompt = prompts::discovery_prompt(sample);

        let taxonomy = self
            .retry
            .run("discover", || {
                let prompt = prompt.clone();
                async move {
                    let text = self.chat(prompts::DISCOVERY_SYSTEM, prompt, 0.3).await?;
                    response::parse_discovery(&text)
                }
            })
            .await?;

        debug!(
            categories = taxonomy.categories.len(),
            sample = sample.len(),
            "Discovered taxonomy"
        );
        Ok(taxonomy)
    }

    /// Classify one batch of accounts against a taxonomy. Results pair
    /// positionally with the input batch.
    pub async fn classify_batch(
        &self,
        accounts: &[Account],
        taxonomy: &Taxonomy,
    ) -> Result<Vec<ClassificationResult>> {
        let prompt = prompts::classify_prompt(accounts, taxonomy);

        let results = self
            .retry
            .run("classify_batch", || {
                let prompt = prompt.clone();
                async move {
                    let text = self.chat(prompts::CLASSIFY_SYSTEM, prompt, 0.2).await?;
                    response::parse_batch(&text)
                }
            })
            .await?;

        if results.len() != accounts.len() {
            tracing::warn!(
                sent = accounts.len(),
                received = results.len(),
                "Classification count mismatch, pairing positionally"
            );
        }
        Ok(results)
    }

    async fn chat(&self, system: &str, user: String, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
        };

        debug!(model = %request.model, "Grok chat request");

        let resp = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GrokError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GrokError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GrokError::EmptyResponse)
    }
}

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // X API
    pub x_bearer_token: String,
    /// Default identity to scan when a request supplies neither id nor handle.
    pub default_user_id: Option<String>,

    // Grok
    pub xai_api_key: String,
    pub grok_model: Option<String>,

    // Categorization cache
    pub cache_freshness_days: i64,

    // Web server
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            x_bearer_token: required_env("X_API_BEARER_TOKEN"),
            default_user_id: env::var("X_USER_ID").ok().filter(|v| !v.is_empty()),
            xai_api_key: required_env("XAI_API_KEY"),
            grok_model: env::var("GROK_MODEL").ok().filter(|v| !v.is_empty()),
            cache_freshness_days: env::var("CACHE_FRESHNESS_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .expect("CACHE_FRESHNESS_DAYS must be a number"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("PORT must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrokError>;

#[derive(Debug, Error)]
pub enum GrokError {
    #[error("Grok API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response from Grok")]
    EmptyResponse,

    #[error("Failed to parse Grok response: {0}")]
    Parse(String),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl GrokError {
    /// Whether a retry could plausibly succeed. Communication and parse
    /// failures are transient; a well-formed response with the wrong shape
    /// is not going to change on resend.
    pub fn is_retryable(&self) -> bool {
        match self {
            GrokError::Api { .. } => true,
            GrokError::Network(_) => true,
            GrokError::EmptyResponse => true,
            GrokError::Parse(_) => true,
            GrokError::Shape(_) => false,
        }
    }
}

impl From<reqwest::Error> for GrokError {
    fn from(err: reqwest::Error) -> Self {
        GrokError::Network(err.to_string())
    }
}

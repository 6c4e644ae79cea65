use thiserror::Error;

/// Failure taxonomy for the scan pipeline. Every variant preserves the
/// originating message; `origin` feeds the public job status so callers can
/// tell an identity-source failure from a model or storage one.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Identity source error: {0}")]
    Source(#[from] x_client::XApiError),

    #[error("Classification error: {0}")]
    Model(#[from] grok_client::GrokError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No accounts found to classify")]
    NoAccounts,

    #[error("Handle @{0} not found")]
    HandleNotFound(String),

    #[error("A scan is already running for identity {0}")]
    ScanInProgress(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn origin(&self) -> &'static str {
        match self {
            ScanError::Source(_) | ScanError::HandleNotFound(_) => "identity_source",
            ScanError::Model(_) => "model",
            ScanError::Storage(_) => "storage",
            ScanError::NoAccounts | ScanError::ScanInProgress(_) | ScanError::Validation(_) => {
                "validation"
            }
            ScanError::Internal(_) => "internal",
        }
    }
}

//! Classifier capability: one label per file name, chosen from a candidate set.

use thiserror::Error;

pub mod local;
pub mod openai;

/// Label used when no better answer is available.
pub const FALLBACK_LABEL: &str = "Other";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no model loaded")]
    Unavailable,
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("endpoint must use https: {0}")]
    InsecureEndpoint(String),
}

impl ProviderError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Authentication(_))
    }
}

/// Returns one label per entry of `file_names`, in the same order.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(
        &self,
        file_names: &[String],
        labels: &[String],
    ) -> Result<Vec<String>, ProviderError>;
}

//! Translation Layer
//!
//! Sends batches of recognized text to a remote translation service.

mod google;
mod language;
mod retry;

pub use google::{parse_translate_response, GoogleTranslateClient, TranslateRequest};
pub use language::{Language, UnsupportedLanguage};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use thiserror::Error;

/// Translation failure with retry classification
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("translation service unavailable (HTTP {status})")]
    Server { status: u16 },

    #[error("translation service rejected the API key")]
    Authentication,

    #[error("translation service error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("unparsable translation response: {0}")]
    Parse(String),

    #[error("translation response has {received} entries for {expected} inputs")]
    Misaligned { expected: usize, received: usize },

    #[error("no translation API key configured")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TranslationError {
    /// Returns true for failures worth one more attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TranslationError::Network(_)
                | TranslationError::Timeout
                | TranslationError::RateLimited
                | TranslationError::Server { .. }
        )
    }
}

/// Remote batch translation service
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `texts` into `target`
    ///
    /// On success the result has exactly `texts.len()` entries, where entry
    /// `i` is the translation of `texts[i]`. An empty batch returns an empty
    /// result without contacting the service.
    async fn translate_batch(&self, texts: &[String], target: Language) -> Result<Vec<String>, TranslationError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TranslationError::Network("reset".into()).is_transient());
        assert!(TranslationError::Timeout.is_transient());
        assert!(TranslationError::RateLimited.is_transient());
        assert!(TranslationError::Server { status: 503 }.is_transient());

        assert!(!TranslationError::Authentication.is_transient());
        assert!(!TranslationError::Parse("eof".into()).is_transient());
        assert!(!TranslationError::Misaligned { expected: 2, received: 1 }.is_transient());
        assert!(!TranslationError::Provider {
            status: 400,
            message: "bad target".into()
        }
        .is_transient());
    }
}

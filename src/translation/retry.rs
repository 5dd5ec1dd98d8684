use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use super::TranslationError;

/// Bounded retry for transient translation failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u8,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u8, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    pub fn should_retry(&self, attempt: u8, error: &TranslationError) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        error.is_transient()
    }

    pub async fn wait_before_retry(&self, attempt: u8) {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        let delay = self.base_delay.saturating_mul(multiplier);

        info!(
            "Retrying translation in {:?} (attempt {})",
            delay,
            attempt + 2
        );
        sleep(delay).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(500))
    }
}

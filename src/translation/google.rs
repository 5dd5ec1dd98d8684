//! Google Cloud Translation (v2) client
//!
//! One POST per batch: `{ q: [..], target, format: "text" }`, answered with
//! `{ data: { translations: [ { translatedText }, .. ] } }` in request order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{Language, RetryPolicy, TranslationError, Translator};
use crate::config::TranslationSettings;

/// Request body
#[derive(Debug, Serialize)]
pub struct TranslateRequest<'a> {
    pub q: &'a [String],
    pub target: &'a str,
    pub format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<TranslationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationEntry {
    translated_text: String,
    #[allow(dead_code)]
    detected_source_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parse a translate response, requiring one translation per input
pub fn parse_translate_response(body: &str, expected: usize) -> Result<Vec<String>, TranslationError> {
    let response: TranslateResponse =
        serde_json::from_str(body).map_err(|e| TranslationError::Parse(e.to_string()))?;

    let translations: Vec<String> = response
        .data
        .translations
        .into_iter()
        .map(|entry| entry.translated_text)
        .collect();

    if translations.len() != expected {
        return Err(TranslationError::Misaligned {
            expected,
            received: translations.len(),
        });
    }

    Ok(translations)
}

pub struct GoogleTranslateClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GoogleTranslateClient {
    /// Build a client from settings, resolving the API key from file or environment
    pub fn from_settings(settings: &TranslationSettings) -> Result<Self, TranslationError> {
        let api_key = settings.resolve_api_key().ok_or(TranslationError::MissingApiKey)?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: &TranslationSettings, api_key: String) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| TranslationError::Client(e.to_string()))?;

        Ok(Self::with_http_client(settings, api_key, client))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots); its timeout applies
    pub fn with_http_client(settings: &TranslationSettings, api_key: String, client: reqwest::Client) -> Self {
        info!("Translation client initialized for {}", settings.endpoint);

        Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key,
            retry: RetryPolicy::new(settings.max_retries, settings.retry_delay()),
        }
    }

    async fn send_once(&self, texts: &[String], target: Language) -> Result<Vec<String>, TranslationError> {
        let body = TranslateRequest {
            q: texts,
            target: target.code(),
            format: "text",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport_error)?;

        if status.is_success() {
            return parse_translate_response(&text, texts.len());
        }

        Err(match status.as_u16() {
            401 | 403 => TranslationError::Authentication,
            429 => TranslationError::RateLimited,
            code if status.is_server_error() => TranslationError::Server { status: code },
            code => TranslationError::Provider {
                status: code,
                message: serde_json::from_str::<ErrorResponse>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text),
            },
        })
    }
}

/// The request URL carries the API key and must not reach error text
fn classify_transport_error(e: reqwest::Error) -> TranslationError {
    let e = e.without_url();
    if e.is_timeout() {
        TranslationError::Timeout
    } else if e.is_decode() {
        TranslationError::Parse(e.to_string())
    } else {
        TranslationError::Network(e.to_string())
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate_batch(&self, texts: &[String], target: Language) -> Result<Vec<String>, TranslationError> {
        if texts.is_empty() {
            debug!("Empty batch, skipping translation request");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut attempt = 0u8;

        loop {
            match self.send_once(texts, target).await {
                Ok(translations) => {
                    debug!(
                        "Translated {} fragments to '{}' in {:?}",
                        translations.len(),
                        target,
                        start.elapsed()
                    );
                    return Ok(translations);
                }
                Err(err) if self.retry.should_retry(attempt, &err) => {
                    warn!("Translation attempt {} failed: {}", attempt + 1, err);
                    self.retry.wait_before_retry(attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!("Translation failed after {} attempt(s): {}", attempt + 1, err);
                    return Err(err);
                }
            }
        }
    }

    fn name(&self) -> &str {
        "Google Translate"
    }
}

//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::translation::Language;

/// Default translation endpoint (Google Cloud Translation v2)
pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Environment variable consulted when no API key is configured
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Translation service settings
    pub translation: TranslationSettings,
    /// Text recognition settings
    pub recognition: RecognitionSettings,
    /// Result presentation settings
    pub display: DisplaySettings,
    /// Session defaults
    pub session: SessionSettings,
    /// Local persistence settings
    pub storage: StorageSettings,
}

/// Translation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Endpoint receiving batched translate requests
    pub endpoint: String,
    /// API key; takes precedence over `api_key_env`
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after a transient network failure
    pub max_retries: u8,
    /// Delay before a retry in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 10,
            max_retries: 1,
            retry_delay_ms: 500,
        }
    }
}

impl TranslationSettings {
    /// Resolve the API key from the file first, then the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Image preprocessing applied before recognition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrPreprocessing {
    /// Master switch
    pub enabled: bool,
    /// Convert to luminance
    pub grayscale: bool,
    /// Stretch the luminance range to the full 0-255 span
    pub contrast_stretch: bool,
    /// Binary threshold level; pixels above it become black (inverted threshold)
    pub threshold: Option<u8>,
    /// Invert colors (light text on dark backgrounds)
    pub invert: bool,
    /// Integer upscale factor (1 = unchanged)
    pub scale: u32,
}

impl Default for OcrPreprocessing {
    fn default() -> Self {
        Self {
            enabled: false,
            grayscale: true,
            contrast_stretch: true,
            threshold: None,
            invert: false,
            scale: 1,
        }
    }
}

/// Text recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Preprocessing filters
    pub preprocessing: OcrPreprocessing,
    /// Fragments below this confidence are dropped (0.0 - 1.0)
    pub min_confidence: f32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            preprocessing: OcrPreprocessing {
                enabled: true,
                ..Default::default()
            },
            min_confidence: 0.0,
        }
    }
}

/// Result presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Text shown while translating and when translation fails
    pub untranslated_placeholder: String,
    /// Place the translation as a 3D text node in the AR scene
    pub place_text_node: bool,
    /// Scene position of the text node (meters, camera space)
    pub text_node_position: [f32; 3],
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            untranslated_placeholder: "Translating...".to_string(),
            place_text_node: false,
            text_node_position: [0.0, 0.0, -0.5],
        }
    }
}

/// Session defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Target language until the user picks one
    pub default_language: Language,
}

/// Local persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database path; defaults to the platform data directory
    pub database_path: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

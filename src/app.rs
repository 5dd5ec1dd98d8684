//! Application Coordinator
//!
//! Wires configuration, local storage, the session controller and the
//! presentation thread together, and builds capture pipelines on demand.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::capture::CaptureSurface;
use crate::config::AppConfig;
use crate::overlay::console::spawn_console_overlay;
use crate::overlay::{overlay_channel, OverlayMessage, OverlayPublisher, OverlayState};
use crate::pipeline::CapturePipeline;
use crate::session::SessionController;
use crate::storage::{self, Database, SqliteCredentialStore, SqlitePreferenceStore};
use crate::translation::{GoogleTranslateClient, TranslationError, Translator};
use crate::vision::{RecognizerAdapter, TextRecognizer};

/// Main application coordinator
pub struct ArTranslateApp {
    config: AppConfig,
    database_path: PathBuf,
    session: SessionController,
    /// Publisher handed to pipelines while the overlay runs
    overlay: Option<OverlayPublisher>,
    /// Handle to the overlay thread
    overlay_handle: Option<JoinHandle<OverlayState>>,
}

impl ArTranslateApp {
    /// Open storage and restore the previous session
    pub fn new(config: AppConfig) -> Result<Self> {
        let database_path = match &config.storage.database_path {
            Some(path) => path.clone(),
            None => storage::default_database_path()?,
        };

        let database = Database::open(&database_path)
            .with_context(|| format!("Failed to open database at {:?}", database_path))?;
        info!("Using database {:?}", database_path);

        let session = SessionController::new(
            Arc::new(SqliteCredentialStore::new(database.clone())),
            Arc::new(SqlitePreferenceStore::new(database)),
            config.session.default_language,
        );

        match session.restore_last_session() {
            Ok(true) => info!("Resumed previous session"),
            Ok(false) => {}
            Err(e) => warn!("Could not restore previous session: {}", e),
        }

        Ok(Self {
            config,
            database_path,
            session,
            overlay: None,
            overlay_handle: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.database_path
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Build the translation client from configuration
    pub fn translator(&self) -> Result<Arc<dyn Translator>, TranslationError> {
        let client = GoogleTranslateClient::from_settings(&self.config.translation)?;
        Ok(Arc::new(client))
    }

    /// Start the terminal overlay in a background thread
    pub fn start_overlay(&mut self) {
        if self.overlay.is_some() {
            return;
        }

        let (publisher, receiver) = overlay_channel();
        self.overlay_handle = Some(spawn_console_overlay(receiver));
        self.overlay = Some(publisher);
        info!("Overlay started in background thread");
    }

    /// Attach a host-owned presentation layer instead of the terminal overlay
    pub fn attach_overlay(&mut self) -> Receiver<OverlayMessage> {
        let (publisher, receiver) = overlay_channel();
        self.overlay = Some(publisher);
        receiver
    }

    /// Build a pipeline that publishes to the running overlay
    pub fn pipeline(
        &mut self,
        surface: Arc<dyn CaptureSurface>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Result<CapturePipeline, TranslationError> {
        let translator = self.translator()?;
        let adapter = RecognizerAdapter::new(recognizer, self.config.recognition.clone());
        let overlay = match &self.overlay {
            Some(publisher) => publisher.clone(),
            None => {
                self.start_overlay();
                self.overlay.clone().ok_or_else(|| {
                    TranslationError::Client("overlay channel unavailable".to_string())
                })?
            }
        };

        Ok(CapturePipeline::new(
            surface,
            adapter,
            translator,
            overlay,
            self.config.display.clone(),
        ))
    }

    /// Stop the overlay and return what it last showed
    ///
    /// Pipelines built from this app must be dropped first, otherwise the
    /// overlay thread keeps waiting for their messages.
    pub fn stop_overlay(&mut self) -> Option<OverlayState> {
        self.overlay = None;
        let handle = self.overlay_handle.take()?;
        match handle.join() {
            Ok(state) => Some(state),
            Err(_) => {
                tracing::error!("Overlay thread panicked");
                None
            }
        }
    }
}

impl Drop for ArTranslateApp {
    fn drop(&mut self) {
        self.stop_overlay();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::CapturedFrame;
    use crate::capture::LiveFrameSurface;
    use crate::translation::Language;
    use crate::vision::ScriptedRecognizer;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.database_path = Some(dir.path().join("app.db"));
        config.translation.api_key = None;
        config.translation.api_key_env = "AR_TRANSLATE_TEST_UNSET_KEY".to_string();
        config
    }

    #[test]
    fn test_session_survives_restart() {
        let dir = TempDir::new().unwrap();

        {
            let app = ArTranslateApp::new(test_config(&dir)).unwrap();
            app.session().signup("ana", "ana@example.com", "pw").unwrap();
            app.session().set_target_language(Language::French).unwrap();
        }

        let app = ArTranslateApp::new(test_config(&dir)).unwrap();
        let session = app.session().session();
        assert!(session.is_logged_in);
        assert_eq!(session.current_username.as_deref(), Some("ana"));
        assert_eq!(session.target_language, Language::French);
    }

    #[test]
    fn test_logout_persists() {
        let dir = TempDir::new().unwrap();

        {
            let app = ArTranslateApp::new(test_config(&dir)).unwrap();
            app.session().signup("ana", "ana@example.com", "pw").unwrap();
            app.session().logout().unwrap();
        }

        let app = ArTranslateApp::new(test_config(&dir)).unwrap();
        assert!(!app.session().session().is_logged_in);
        assert!(app.session().login("ana", "pw").is_err());
    }

    #[test]
    fn test_pipeline_requires_api_key() {
        let dir = TempDir::new().unwrap();
        let mut app = ArTranslateApp::new(test_config(&dir)).unwrap();

        let surface = Arc::new(LiveFrameSurface::new());
        surface.present(CapturedFrame::new(vec![0; 4], 1, 1));
        let result = app.pipeline(surface, Arc::new(ScriptedRecognizer::empty()));
        assert!(matches!(result, Err(TranslationError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_pipeline_publishes_to_attached_overlay() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.translation.api_key = Some("test-key".to_string());
        let mut app = ArTranslateApp::new(config).unwrap();
        let receiver = app.attach_overlay();

        let surface = Arc::new(LiveFrameSurface::new());
        surface.present(CapturedFrame::new(vec![0; 4], 1, 1));
        let pipeline = app
            .pipeline(surface, Arc::new(ScriptedRecognizer::empty()))
            .unwrap();

        let outcome = pipeline.run(Language::English).await.unwrap();
        assert_eq!(outcome.display_text, "");
        assert_eq!(receiver.try_iter().count(), 1);
    }
}

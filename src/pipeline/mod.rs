//! Capture Pipeline
//!
//! Drives one capture through snapshot, recognition, translation and display:
//!
//! ```text
//! Idle -> Capturing -> Recognizing -> Translating -> Displaying -> Idle
//!                  \-> Failed(reason) -> Idle
//! ```
//!
//! Only one run may be in flight. Each run gets a cancellation token derived
//! from the pipeline's lifetime token, so [`CapturePipeline::cancel`] stops the
//! current run and dropping the pipeline stops everything. A cancelled or torn
//! down run never publishes to the overlay.

pub mod state;

pub use state::{FailureReason, PipelineState};

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::frame::CapturedFrame;
use crate::capture::CaptureSurface;
use crate::config::DisplaySettings;
use crate::overlay::scene::SceneCommand;
use crate::overlay::{OverlayMessage, OverlayPublisher, TextNode, TranslationDisplay};
use crate::translation::{Language, Translator};
use crate::vision::{RecognitionError, RecognizerAdapter};

/// Capacity of the state transition channel
const TRANSITION_CHANNEL_CAPACITY: usize = 32;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    /// Recognized fragments joined with single spaces
    pub source_text: String,
    /// Translations joined with single spaces; empty when nothing was recognized
    pub display_text: String,
    pub language: Language,
    pub fragment_count: usize,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a capture is already in progress")]
    Busy,

    #[error("capture cancelled")]
    Cancelled,

    #[error("capture pipeline has been shut down")]
    ShutDown,

    #[error("{0}")]
    Failed(FailureReason),
}

/// Orchestrates capture runs
///
/// Dropping the pipeline cancels any in-flight run.
pub struct CapturePipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    surface: Arc<dyn CaptureSurface>,
    recognizer: RecognizerAdapter,
    translator: Arc<dyn Translator>,
    overlay: OverlayPublisher,
    display: DisplaySettings,
    state: RwLock<PipelineState>,
    transitions: broadcast::Sender<PipelineState>,
    /// Token of the run in flight, if any
    in_flight: Mutex<Option<CancellationToken>>,
    lifetime: CancellationToken,
}

impl CapturePipeline {
    pub fn new(
        surface: Arc<dyn CaptureSurface>,
        recognizer: RecognizerAdapter,
        translator: Arc<dyn Translator>,
        overlay: OverlayPublisher,
        display: DisplaySettings,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(PipelineInner {
                surface,
                recognizer,
                translator,
                overlay,
                display,
                state: RwLock::new(PipelineState::Idle),
                transitions,
                in_flight: Mutex::new(None),
                lifetime: CancellationToken::new(),
            }),
        }
    }

    /// Run one capture to completion
    ///
    /// Fails with [`PipelineError::Busy`] if another run is in flight.
    pub async fn run(&self, target: Language) -> Result<PipelineOutcome, PipelineError> {
        Arc::clone(&self.inner).run(target).await
    }

    /// Start a run on the runtime without waiting for it
    pub fn spawn(&self, target: Language) -> JoinHandle<Result<PipelineOutcome, PipelineError>> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run(target))
    }

    /// Cancel the in-flight run; returns false when nothing was running
    pub fn cancel(&self) -> bool {
        match self.inner.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel everything and refuse further runs
    pub fn shutdown(&self) {
        if !self.inner.lifetime.is_cancelled() {
            info!("Capture pipeline shutting down");
            self.inner.lifetime.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.inner.state.read().clone()
    }

    /// Follow state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineState> {
        self.inner.transitions.subscribe()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ends a run: returns the state to idle, then frees the in-flight slot
///
/// Runs on every exit path, including when the run future is dropped
/// mid-stage by an aborted task or an outer timeout.
struct InFlightGuard<'a> {
    pipeline: &'a PipelineInner,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.pipeline.state.read().is_idle() {
            debug!("Run ended mid-stage, resetting pipeline state");
            self.pipeline.transition(PipelineState::Idle);
        }
        *self.pipeline.in_flight.lock() = None;
    }
}

impl PipelineInner {
    fn begin(&self) -> Result<(InFlightGuard<'_>, CancellationToken), PipelineError> {
        if self.lifetime.is_cancelled() {
            return Err(PipelineError::ShutDown);
        }

        let mut slot = self.in_flight.lock();
        if slot.is_some() {
            return Err(PipelineError::Busy);
        }

        let token = self.lifetime.child_token();
        *slot = Some(token.clone());
        Ok((InFlightGuard { pipeline: self }, token))
    }

    async fn run(self: Arc<Self>, target: Language) -> Result<PipelineOutcome, PipelineError> {
        let (_guard, cancel) = match self.begin() {
            Ok(run) => run,
            Err(e) => {
                debug!("Capture rejected: {}", e);
                return Err(e);
            }
        };

        let run_id = Uuid::new_v4();
        let start = Instant::now();
        info!("[{}] Capture started (target: {})", run_id, target.code());

        // Capturing
        self.transition(PipelineState::Capturing);
        let frame = match self.snapshot().await {
            Ok(frame) => frame,
            Err(detail) => return self.fail(run_id, &cancel, FailureReason::Capture(detail)),
        };
        if cancel.is_cancelled() {
            return self.abort(run_id);
        }
        debug!("[{}] Snapshot {}x{}", run_id, frame.width, frame.height);

        // Recognizing
        self.transition(PipelineState::Recognizing);
        let fragments = match self.recognizer.recognize(frame, &cancel).await {
            Ok(fragments) => fragments,
            Err(RecognitionError::Cancelled) => return self.abort(run_id),
            Err(e) => {
                return self.fail(run_id, &cancel, FailureReason::Recognition(e.to_string()))
            }
        };
        let texts: Vec<String> = fragments.into_iter().map(|fragment| fragment.text).collect();
        info!("[{}] Recognized {} fragments", run_id, texts.len());

        // Translating
        self.transition(PipelineState::Translating);
        let translations = if texts.is_empty() {
            Vec::new()
        } else {
            self.publish(
                &cancel,
                OverlayMessage::ShowPlaceholder(self.display.untranslated_placeholder.clone()),
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => return self.abort(run_id),
                result = self.translator.translate_batch(&texts, target) => result,
            };

            match result {
                Ok(translations) if translations.len() == texts.len() => translations,
                Ok(translations) => {
                    let detail = format!(
                        "{} returned {} translations for {} fragments",
                        self.translator.name(),
                        translations.len(),
                        texts.len()
                    );
                    return self.fail(run_id, &cancel, FailureReason::Translation(detail));
                }
                Err(e) => {
                    return self.fail(run_id, &cancel, FailureReason::Translation(e.to_string()))
                }
            }
        };
        if cancel.is_cancelled() {
            return self.abort(run_id);
        }

        // Displaying
        self.transition(PipelineState::Displaying);
        let outcome = PipelineOutcome {
            run_id,
            source_text: texts.join(" "),
            display_text: translations.join(" "),
            language: target,
            fragment_count: texts.len(),
        };

        self.publish(
            &cancel,
            OverlayMessage::ShowTranslation(TranslationDisplay {
                text: outcome.display_text.clone(),
                source_text: outcome.source_text.clone(),
                language: target,
            }),
        );
        if self.display.place_text_node && !outcome.display_text.is_empty() {
            self.publish(&cancel, OverlayMessage::Scene(SceneCommand::ClearAnchors));
            self.publish(
                &cancel,
                OverlayMessage::Scene(SceneCommand::PlaceTextNode(TextNode::new(
                    outcome.display_text.clone(),
                    self.display.text_node_position,
                ))),
            );
        }

        self.transition(PipelineState::Idle);
        info!("[{}] Capture complete in {:?}", run_id, start.elapsed());

        Ok(outcome)
    }

    /// Snapshot off the async executor; surfaces may read from disk
    async fn snapshot(&self) -> Result<CapturedFrame, String> {
        let surface = Arc::clone(&self.surface);
        match tokio::task::spawn_blocking(move || surface.snapshot()).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("snapshot task failed: {}", e)),
        }
    }

    fn transition(&self, state: PipelineState) {
        debug!("Pipeline state -> {}", state.label());
        *self.state.write() = state.clone();
        // No subscribers is fine
        let _ = self.transitions.send(state);
    }

    fn publish(&self, cancel: &CancellationToken, message: OverlayMessage) {
        if cancel.is_cancelled() {
            debug!("Run cancelled, not publishing overlay update");
            return;
        }
        self.overlay.publish(message);
    }

    fn fail(
        &self,
        run_id: Uuid,
        cancel: &CancellationToken,
        reason: FailureReason,
    ) -> Result<PipelineOutcome, PipelineError> {
        warn!("[{}] Capture failed: {}", run_id, reason);
        self.transition(PipelineState::Failed(reason.clone()));
        self.publish(
            cancel,
            OverlayMessage::ShowFailure {
                placeholder: self.display.untranslated_placeholder.clone(),
                message: reason.user_message().to_string(),
            },
        );
        self.transition(PipelineState::Idle);
        Err(PipelineError::Failed(reason))
    }

    fn abort(&self, run_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        info!("[{}] Capture cancelled", run_id);
        self.transition(PipelineState::Idle);
        Err(PipelineError::Cancelled)
    }
}

//! Vision/OCR Layer
//!
//! Text recognition itself belongs to the host vision engine, reached through
//! the [`TextRecognizer`] trait. [`RecognizerAdapter`] wraps an engine with
//! preprocessing, confidence filtering and cancellation.

pub mod ocr_preprocess;
pub mod scripted;

pub use ocr_preprocess::{apply_preprocessing, preprocess_frame, PreprocessResult};
pub use scripted::ScriptedRecognizer;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

use crate::capture::frame::CapturedFrame;
use crate::config::RecognitionSettings;

/// One block of text found in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFragment {
    /// Recognized text content
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Bounding box (x, y, width, height), if the engine reports one
    pub bounds: Option<(u32, u32, u32, u32)>,
}

impl RecognizedFragment {
    /// Fragment with full confidence and no bounds
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 1.0,
            bounds: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The vision engine reported a failure
    #[error("vision engine error: {0}")]
    Engine(String),

    /// The recognition task panicked or was aborted by the runtime
    #[error("recognition task failed: {0}")]
    TaskFailed(String),

    /// The run was cancelled before the engine finished
    #[error("recognition cancelled")]
    Cancelled,
}

/// Host vision engine
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text regions in a frame, in engine-reported order
    async fn recognize(&self, frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError>;

    /// Engine name for logs
    fn name(&self) -> &str;
}

/// Runs a [`TextRecognizer`] on a background task
///
/// Every call resolves exactly once. Dropping the adapter cancels all of its
/// in-flight calls, so no result is delivered after teardown.
pub struct RecognizerAdapter {
    engine: Arc<dyn TextRecognizer>,
    settings: RecognitionSettings,
    lifetime: CancellationToken,
}

impl RecognizerAdapter {
    pub fn new(engine: Arc<dyn TextRecognizer>, settings: RecognitionSettings) -> Self {
        Self {
            engine,
            settings,
            lifetime: CancellationToken::new(),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Preprocess `frame` and recognize its text
    ///
    /// Resolves to [`RecognitionError::Cancelled`] if `cancel` fires or the
    /// adapter is dropped first; the engine task is aborted in that case, and
    /// also when the returned future is dropped before completing.
    pub async fn recognize(
        &self,
        frame: CapturedFrame,
        cancel: &CancellationToken,
    ) -> Result<Vec<RecognizedFragment>, RecognitionError> {
        let start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let preprocessing = self.settings.preprocessing.clone();

        let mut task = AbortOnDropHandle::new(tokio::spawn(async move {
            let frame = ocr_preprocess::preprocess_frame(&frame, &preprocessing);
            engine.recognize(&frame).await
        }));

        let lifetime = self.lifetime.clone();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            _ = lifetime.cancelled() => None,
            joined = &mut task => Some(joined),
        };

        let Some(joined) = outcome else {
            task.abort();
            debug!("Recognition cancelled after {:?}", start.elapsed());
            return Err(RecognitionError::Cancelled);
        };

        let fragments = joined.map_err(|e| RecognitionError::TaskFailed(e.to_string()))??;
        let total = fragments.len();
        let kept = self.filter(fragments);

        debug!(
            "Recognition ({}) complete in {:?}: {} fragments, {} kept",
            self.engine.name(),
            start.elapsed(),
            total,
            kept.len()
        );

        Ok(kept)
    }

    /// Drop blank fragments and those under the confidence threshold, keeping order
    fn filter(&self, fragments: Vec<RecognizedFragment>) -> Vec<RecognizedFragment> {
        let min_confidence = self.settings.min_confidence;
        fragments
            .into_iter()
            .filter_map(|fragment| {
                let text = fragment.text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                if fragment.confidence < min_confidence {
                    debug!(
                        "Dropping fragment below confidence threshold ({:.2} < {:.2})",
                        fragment.confidence, min_confidence
                    );
                    return None;
                }
                Some(RecognizedFragment { text, ..fragment })
            })
            .collect()
    }
}

impl Drop for RecognizerAdapter {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn frame() -> CapturedFrame {
        CapturedFrame::new(vec![128; 4 * 4], 2, 2)
    }

    struct SlowRecognizer {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TextRecognizer for SlowRecognizer {
        async fn recognize(&self, _frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(vec![RecognizedFragment::new("late")])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct BrokenRecognizer;

    #[async_trait]
    impl TextRecognizer for BrokenRecognizer {
        async fn recognize(&self, _frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError> {
            Err(RecognitionError::Engine("model unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct DimensionEcho;

    #[async_trait]
    impl TextRecognizer for DimensionEcho {
        async fn recognize(&self, frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError> {
            Ok(vec![RecognizedFragment::new(format!("{}x{}", frame.width, frame.height))])
        }

        fn name(&self) -> &str {
            "dimension-echo"
        }
    }

    #[tokio::test]
    async fn test_fragments_keep_engine_order() {
        let engine = ScriptedRecognizer::new(["Hola", "Mundo", "Adiós"]);
        let adapter = RecognizerAdapter::new(Arc::new(engine), RecognitionSettings::default());

        let fragments = adapter.recognize(frame(), &CancellationToken::new()).await.unwrap();
        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Hola", "Mundo", "Adiós"]);
    }

    #[tokio::test]
    async fn test_zero_fragments_is_success() {
        let adapter = RecognizerAdapter::new(
            Arc::new(ScriptedRecognizer::empty()),
            RecognitionSettings::default(),
        );
        let fragments = adapter.recognize(frame(), &CancellationToken::new()).await.unwrap();
        assert!(fragments.is_empty());
    }

    #[tokio::test]
    async fn test_blank_and_low_confidence_fragments_dropped() {
        let engine = ScriptedRecognizer::from_fragments(vec![
            RecognizedFragment::new("  keep  "),
            RecognizedFragment::new("   "),
            RecognizedFragment {
                text: "noise".to_string(),
                confidence: 0.2,
                bounds: Some((0, 0, 4, 4)),
            },
        ]);
        let settings = RecognitionSettings {
            min_confidence: 0.5,
            ..Default::default()
        };
        let adapter = RecognizerAdapter::new(Arc::new(engine), settings);

        let fragments = adapter.recognize(frame(), &CancellationToken::new()).await.unwrap();
        assert_eq!(fragments, vec![RecognizedFragment::new("keep")]);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let adapter = RecognizerAdapter::new(Arc::new(BrokenRecognizer), RecognitionSettings::default());
        let result = adapter.recognize(frame(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(RecognitionError::Engine(_))));
    }

    #[tokio::test]
    async fn test_preprocessing_runs_before_engine() {
        let mut settings = RecognitionSettings::default();
        settings.preprocessing.scale = 2;
        let adapter = RecognizerAdapter::new(Arc::new(DimensionEcho), settings);

        let fragments = adapter.recognize(frame(), &CancellationToken::new()).await.unwrap();
        assert_eq!(fragments[0].text, "4x4");
    }

    #[tokio::test]
    async fn test_cancel_token_aborts_engine() {
        let finished = Arc::new(AtomicBool::new(false));
        let adapter = RecognizerAdapter::new(
            Arc::new(SlowRecognizer { finished: finished.clone() }),
            RecognitionSettings::default(),
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = adapter.recognize(frame(), &cancel).await;
        assert!(matches!(result, Err(RecognitionError::Cancelled)));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_adapter_lifetime_cancels_in_flight_call() {
        let adapter = Arc::new(RecognizerAdapter::new(
            Arc::new(SlowRecognizer {
                finished: Arc::new(AtomicBool::new(false)),
            }),
            RecognitionSettings::default(),
        ));
        let lifetime = adapter.lifetime.clone();

        let pending = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.recognize(frame(), &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        lifetime.cancel();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(RecognitionError::Cancelled)));
    }

    /// Sets its flag when the engine future holding it is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct HangingRecognizer {
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TextRecognizer for HangingRecognizer {
        async fn recognize(&self, _frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError> {
            let _flag = DropFlag(Arc::clone(&self.dropped));
            std::future::pending::<()>().await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_dropped_call_aborts_engine_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let adapter = RecognizerAdapter::new(
            Arc::new(HangingRecognizer {
                dropped: Arc::clone(&dropped),
            }),
            RecognitionSettings::default(),
        );
        let cancel = CancellationToken::new();

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            adapter.recognize(frame(), &cancel),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_drop_cancels_lifetime() {
        let adapter = RecognizerAdapter::new(Arc::new(BrokenRecognizer), RecognitionSettings::default());
        let lifetime = adapter.lifetime.clone();
        assert!(!lifetime.is_cancelled());

        drop(adapter);
        assert!(lifetime.is_cancelled());
    }
}

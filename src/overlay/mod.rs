//! Overlay Presentation Boundary
//!
//! Views are owned by the host. The pipeline publishes [`OverlayMessage`]s on
//! a channel and the UI side drains them, so the pipeline never touches view
//! or scene state directly.

pub mod console;
pub mod scene;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::translation::Language;
use scene::{SceneCommand, SceneRoot};

pub use scene::{RecordingScene, TextNode};

/// A finished translation ready to show
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationDisplay {
    /// Translated fragments joined with single spaces
    pub text: String,
    /// Recognized source fragments joined with single spaces
    pub source_text: String,
    pub language: Language,
}

/// Messages sent from the pipeline to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayMessage {
    /// Show placeholder text while a translation is pending
    ShowPlaceholder(String),
    /// Show a finished translation
    ShowTranslation(TranslationDisplay),
    /// A run failed; show the placeholder and a generic error line
    ShowFailure { placeholder: String, message: String },
    /// Mutate the AR scene
    Scene(SceneCommand),
    /// Remove any overlay text
    Clear,
}

/// Sending half of the overlay channel
#[derive(Debug, Clone)]
pub struct OverlayPublisher {
    sender: Sender<OverlayMessage>,
}

impl OverlayPublisher {
    pub fn publish(&self, message: OverlayMessage) {
        if self.sender.send(message).is_err() {
            debug!("Overlay receiver gone, dropping message");
        }
    }
}

/// Create a connected publisher/receiver pair
pub fn overlay_channel() -> (OverlayPublisher, Receiver<OverlayMessage>) {
    let (sender, receiver) = unbounded();
    (OverlayPublisher { sender }, receiver)
}

/// What the overlay is currently showing
#[derive(Debug, Default)]
pub struct OverlayState<S: SceneRoot = RecordingScene> {
    /// Text on screen, if any
    pub text: Option<String>,
    /// Last error line, if the last run failed
    pub error: Option<String>,
    /// Scene the overlay places nodes in
    pub scene: S,
}

impl<S: SceneRoot> OverlayState<S> {
    pub fn with_scene(scene: S) -> Self {
        Self {
            text: None,
            error: None,
            scene,
        }
    }

    /// Apply one message; must be called from the UI context
    pub fn apply(&mut self, message: OverlayMessage) {
        match message {
            OverlayMessage::ShowPlaceholder(text) => {
                self.text = Some(text);
                self.error = None;
            }
            OverlayMessage::ShowTranslation(display) => {
                self.text = Some(display.text);
                self.error = None;
            }
            OverlayMessage::ShowFailure { placeholder, message } => {
                self.text = Some(placeholder);
                self.error = Some(message);
            }
            OverlayMessage::Scene(command) => command.apply(&mut self.scene),
            OverlayMessage::Clear => {
                self.text = None;
                self.error = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_apply_in_order() {
        let (publisher, receiver) = overlay_channel();
        publisher.publish(OverlayMessage::ShowPlaceholder("Translating...".into()));
        publisher.publish(OverlayMessage::ShowTranslation(TranslationDisplay {
            text: "Hello World".into(),
            source_text: "Hola Mundo".into(),
            language: Language::English,
        }));
        publisher.publish(OverlayMessage::Scene(SceneCommand::PlaceTextNode(TextNode::new(
            "Hello World",
            [0.0, 0.0, -0.5],
        ))));

        let mut state = OverlayState::<RecordingScene>::default();
        for message in receiver.try_iter() {
            state.apply(message);
        }

        assert_eq!(state.text.as_deref(), Some("Hello World"));
        assert!(state.error.is_none());
        assert_eq!(state.scene.nodes().len(), 1);
    }

    #[test]
    fn test_failure_shows_placeholder_and_error() {
        let mut state = OverlayState::<RecordingScene>::default();
        state.apply(OverlayMessage::ShowFailure {
            placeholder: "Translating...".into(),
            message: "Translation failed".into(),
        });
        assert_eq!(state.text.as_deref(), Some("Translating..."));
        assert_eq!(state.error.as_deref(), Some("Translation failed"));

        state.apply(OverlayMessage::Clear);
        assert!(state.text.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_publish_without_receiver_does_not_panic() {
        let (publisher, receiver) = overlay_channel();
        drop(receiver);
        publisher.publish(OverlayMessage::Clear);
    }
}

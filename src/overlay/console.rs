//! Terminal overlay
//!
//! Presentation consumer used by the command line front end. Runs on its own
//! thread and prints every overlay update as it arrives.

use crossbeam_channel::Receiver;
use std::thread::JoinHandle;
use tracing::{debug, info};

use super::{OverlayMessage, OverlayState, RecordingScene};
use super::scene::SceneCommand;

/// Spawn the terminal overlay thread
///
/// The thread exits once every [`super::OverlayPublisher`] is dropped and
/// returns what was on screen at that point.
pub fn spawn_console_overlay(receiver: Receiver<OverlayMessage>) -> JoinHandle<OverlayState> {
    std::thread::spawn(move || {
        info!("Console overlay starting...");
        let mut state = OverlayState::<RecordingScene>::default();

        for message in receiver.iter() {
            render(&message);
            state.apply(message);
        }

        debug!("Console overlay exiting with {} placed nodes", state.scene.nodes().len());
        state
    })
}

fn render(message: &OverlayMessage) {
    match message {
        OverlayMessage::ShowPlaceholder(text) => println!("{}", text),
        OverlayMessage::ShowTranslation(display) => {
            println!("[{}] {}", display.language.code(), display.text);
        }
        OverlayMessage::ShowFailure { placeholder, message } => {
            println!("{}", placeholder);
            eprintln!("{}", message);
        }
        OverlayMessage::Scene(SceneCommand::PlaceTextNode(node)) => {
            debug!(
                "Placing text node at ({:.2}, {:.2}, {:.2})",
                node.position[0], node.position[1], node.position[2]
            );
        }
        OverlayMessage::Scene(SceneCommand::ClearAnchors) => debug!("Clearing scene anchors"),
        OverlayMessage::Clear => {}
    }
}

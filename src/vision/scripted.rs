//! Recognizer that returns a fixed list of fragments
//!
//! Stands in for the host vision engine when running off-device, e.g. from
//! the command line where the user supplies the text seen in the image.

use async_trait::async_trait;

use super::{RecognitionError, RecognizedFragment, TextRecognizer};
use crate::capture::frame::CapturedFrame;

#[derive(Debug, Clone, Default)]
pub struct ScriptedRecognizer {
    fragments: Vec<RecognizedFragment>,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: texts.into_iter().map(|text| RecognizedFragment::new(text)).collect(),
        }
    }

    pub fn from_fragments(fragments: Vec<RecognizedFragment>) -> Self {
        Self { fragments }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _frame: &CapturedFrame) -> Result<Vec<RecognizedFragment>, RecognitionError> {
        Ok(self.fragments.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

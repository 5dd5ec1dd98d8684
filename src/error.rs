//! Application-level error taxonomy
//!
//! Module errors convert into [`AppError`] at the boundary where they are
//! reported, so the front end can show one generic line per failure class.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::pipeline::{FailureReason, PipelineError};
use crate::session::AuthError;
use crate::storage::StorageError;
use crate::translation::TranslationError;
use crate::vision::RecognitionError;

/// Failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StorageFailure,
    AuthFailure,
    CaptureFailure,
    RecognitionFailure,
    TranslationFailure,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// A pipeline run failure, already reduced to its reason
    #[error("{0}")]
    Pipeline(FailureReason),

    /// A capture that could not start or was stopped
    #[error(transparent)]
    Rejected(PipelineError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(e) => AppError::Storage(e),
            other => AppError::Auth(other),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Failed(reason) => AppError::Pipeline(reason),
            other => AppError::Rejected(other),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Storage(_) => ErrorKind::StorageFailure,
            AppError::Auth(_) => ErrorKind::AuthFailure,
            AppError::Capture(_) | AppError::Rejected(_) => ErrorKind::CaptureFailure,
            AppError::Recognition(_) => ErrorKind::RecognitionFailure,
            AppError::Translation(_) => ErrorKind::TranslationFailure,
            AppError::Pipeline(reason) => match reason {
                FailureReason::Capture(_) => ErrorKind::CaptureFailure,
                FailureReason::Recognition(_) => ErrorKind::RecognitionFailure,
                FailureReason::Translation(_) => ErrorKind::TranslationFailure,
            },
        }
    }

    /// Text shown to the user; never includes secrets or raw service output
    pub fn user_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Could not access secure storage".to_string(),
            AppError::Auth(AuthError::InvalidInput(detail)) => {
                let mut message = detail.to_string();
                if let Some(first) = message.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                message
            }
            AppError::Auth(_) => "Invalid username or password".to_string(),
            AppError::Capture(_) => "Could not capture the current view".to_string(),
            AppError::Recognition(_) => "Could not read text from the image".to_string(),
            AppError::Translation(TranslationError::MissingApiKey) => {
                "No translation API key configured".to_string()
            }
            AppError::Translation(_) => "Translation failed".to_string(),
            AppError::Pipeline(reason) => reason.user_message().to_string(),
            AppError::Rejected(PipelineError::Busy) => {
                "A capture is already in progress".to_string()
            }
            AppError::Rejected(_) => "Capture cancelled".to_string(),
        }
    }
}

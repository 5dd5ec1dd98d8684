//! Scene Capture Layer
//!
//! The host AR view owns the rendering surface; this layer only asks it for a
//! snapshot of the current frame. The pipeline never controls the surface's
//! lifecycle.

pub mod frame;

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::capture::frame::CapturedFrame;

/// Failure to produce a snapshot
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The surface has not rendered a frame yet
    #[error("capture surface is not ready")]
    NotReady,

    /// The snapshot source could not be read
    #[error("failed to read snapshot from {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    /// The surface produced a buffer that does not match its dimensions
    #[error("snapshot buffer is malformed ({width}x{height}, {len} bytes)")]
    Malformed { width: u32, height: u32, len: usize },
}

/// A rendered surface that can produce snapshots of its current frame
pub trait CaptureSurface: Send + Sync {
    /// Snapshot the frame currently on screen
    fn snapshot(&self) -> Result<CapturedFrame, CaptureError>;
}

/// Surface backed by an image file on disk
#[derive(Debug, Clone)]
pub struct ImageFileSurface {
    path: PathBuf,
}

impl ImageFileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSurface for ImageFileSurface {
    fn snapshot(&self) -> Result<CapturedFrame, CaptureError> {
        let image = image::open(&self.path).map_err(|e| CaptureError::Unreadable {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("Loaded {}x{} snapshot from {:?}", width, height, self.path);
        checked(CapturedFrame::new(rgba.into_raw(), width, height))
    }
}

/// Surface fed by the host view each time it renders a frame
///
/// Until the first frame arrives, snapshots fail with [`CaptureError::NotReady`].
#[derive(Debug, Default)]
pub struct LiveFrameSurface {
    latest: RwLock<Option<CapturedFrame>>,
}

impl LiveFrameSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn present(&self, frame: CapturedFrame) {
        *self.latest.write() = Some(frame);
    }

    /// Drop the current frame, e.g. when the view is torn down
    pub fn reset(&self) {
        *self.latest.write() = None;
    }
}

impl CaptureSurface for LiveFrameSurface {
    fn snapshot(&self) -> Result<CapturedFrame, CaptureError> {
        let frame = self.latest.read().clone().ok_or(CaptureError::NotReady)?;
        checked(frame)
    }
}

fn checked(frame: CapturedFrame) -> Result<CapturedFrame, CaptureError> {
    if frame.is_well_formed() {
        Ok(frame)
    } else {
        Err(CaptureError::Malformed {
            width: frame.width,
            height: frame.height,
            len: frame.data.len(),
        })
    }
}

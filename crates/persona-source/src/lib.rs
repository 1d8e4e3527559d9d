//! persona-source — frame acquisition from a live camera or a recorded
//! video file, behind one `FrameSource` trait.

pub mod camera;
pub mod frame;
pub mod video;

use std::path::PathBuf;
use thiserror::Error;

pub use camera::CameraSource;
pub use frame::Frame;
pub use video::VideoFileSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("device busy: {0}")]
    Busy(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiation(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Which source the run pulls frames from; exactly one is selected at
/// configuration time.
#[derive(Debug, Clone)]
pub enum SourceSelect {
    Camera { device: String },
    Video { path: PathBuf },
}

/// A lazy sequence of frames: infinite for a camera, finite for a file.
///
/// `Ok(None)` signals end of stream. The underlying handle is released
/// when the source is dropped.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Open the selected source.
///
/// Camera acquisition failures split into [`SourceError::NotFound`]
/// (fatal) and [`SourceError::Busy`] (transient; callers may treat it
/// as a graceful startup abort).
pub fn open_source(select: &SourceSelect) -> Result<Box<dyn FrameSource>, SourceError> {
    match select {
        SourceSelect::Camera { device } => Ok(Box::new(CameraSource::open(device)?)),
        SourceSelect::Video { path } => Ok(Box::new(VideoFileSource::open(path)?)),
    }
}

//! Recorded-video source via OpenCV's `VideoCapture`.

use crate::frame::Frame;
use crate::{FrameSource, SourceError};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use opencv::imgproc;
use std::path::Path;

/// Finite frame sequence decoded from a video file. Signals end of
/// stream when decode runs out; the capture handle is released on drop.
pub struct VideoFileSource {
    capture: VideoCapture,
    frames_read: u64,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }

        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let opened = capture
            .is_opened()
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        if !opened {
            return Err(SourceError::Decode(format!(
                "failed to open video file: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "video file opened");

        Ok(Self {
            capture,
            frames_read: 0,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut bgr = Mat::default();
        let read = self
            .capture
            .read(&mut bgr)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if !read || bgr.empty() {
            tracing::debug!(frames = self.frames_read, "video stream exhausted");
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb
            .data_bytes()
            .map_err(|e| SourceError::Decode(e.to_string()))?
            .to_vec();

        self.frames_read += 1;
        Ok(Some(Frame {
            data,
            width,
            height,
        }))
    }
}

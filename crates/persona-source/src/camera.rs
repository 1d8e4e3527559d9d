//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use crate::{FrameSource, SourceError};
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;

/// Live camera source. Blocks on each capture until the next frame is
/// ready; never signals end of stream.
pub struct CameraSource {
    device: Device,
    width: u32,
    height: u32,
}

impl CameraSource {
    /// Open a V4L2 device by path (e.g. "/dev/video0") and negotiate
    /// YUYV capture.
    pub fn open(device_path: &str) -> Result<Self, SourceError> {
        if !Path::new(device_path).exists() {
            return Err(SourceError::NotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let text = e.to_string();
            if text.contains("busy") || text.contains("EBUSY") {
                SourceError::Busy(device_path.to_string())
            } else {
                SourceError::NotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| SourceError::Capture(format!("query capabilities: {e}")))?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(SourceError::FormatNegotiation(format!(
                "{device_path} does not support video capture"
            )));
        }

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "camera opened"
        );

        let mut fmt = device
            .format()
            .map_err(|e| SourceError::FormatNegotiation(format!("get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = CAPTURE_WIDTH;
        fmt.height = CAPTURE_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| SourceError::FormatNegotiation(format!("set format: {e}")))?;

        if negotiated.fourcc != FourCC::new(b"YUYV") {
            return Err(SourceError::FormatNegotiation(format!(
                "unsupported pixel format {:?} (need YUYV)",
                negotiated.fourcc
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            "negotiated YUYV format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| SourceError::Capture(format!("mmap stream: {e}")))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| SourceError::Capture(format!("dequeue buffer: {e}")))?;

        let rgb = frame::yuyv_to_rgb(buf, self.width, self.height)
            .map_err(|e| SourceError::Capture(format!("YUYV conversion: {e}")))?;

        Ok(Some(Frame {
            data: rgb,
            width: self.width,
            height: self.height,
        }))
    }
}

//! Debug window: overlay rendering and the quit-key check.

use crate::overlay::OverlayPlan;
use crate::runner::LoopSignal;
use opencv::core::{Mat, Point as CvPoint, Rect, Scalar, Vec3b, CV_8UC3};
use opencv::prelude::*;
use opencv::{highgui, imgproc};
use persona_source::Frame;
use thiserror::Error;

const BOX_COLOR: (f64, f64, f64) = (10.0, 245.0, 10.0); // green (BGR)
const DOT_COLOR: (f64, f64, f64) = (255.0, 0.0, 0.0); // blue
const TEXT_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0); // red
const QUIT_KEY: i32 = b'q' as i32;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// On-screen debug view. Opened only when debug mode is on; destroyed
/// on drop.
pub struct DebugView {
    window: String,
}

impl DebugView {
    pub fn open(title: &str) -> Result<Self, ViewError> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            window: title.to_string(),
        })
    }

    /// Render the overlay onto a copy of the frame, show it, and poll
    /// for the quit key. The returned signal is the only cancellation
    /// path the view has.
    pub fn present(
        &self,
        frame: &Frame,
        plan: &OverlayPlan,
        fps: f64,
    ) -> Result<LoopSignal, ViewError> {
        let mut canvas = frame_to_bgr(frame)?;

        for annotation in &plan.boxes {
            let b = &annotation.bbox;
            let rect = Rect::new(
                b.x_min as i32,
                b.y_min as i32,
                b.width() as i32,
                b.height() as i32,
            );
            imgproc::rectangle(&mut canvas, rect, scalar(BOX_COLOR), 2, imgproc::LINE_8, 0)?;

            if let Some(caption) = &annotation.caption {
                imgproc::put_text(
                    &mut canvas,
                    caption,
                    CvPoint::new(b.x_min as i32, b.y_min as i32 - 10),
                    imgproc::FONT_HERSHEY_COMPLEX,
                    0.5,
                    scalar(TEXT_COLOR),
                    1,
                    imgproc::LINE_8,
                    false,
                )?;
            }
        }

        for dot in &plan.dots {
            imgproc::circle(
                &mut canvas,
                CvPoint::new(dot.x as i32, dot.y as i32),
                2,
                scalar(DOT_COLOR),
                1,
                imgproc::LINE_8,
                0,
            )?;
        }

        imgproc::put_text(
            &mut canvas,
            &format!("FPS: {fps:.1}"),
            CvPoint::new(10, 30),
            imgproc::FONT_HERSHEY_COMPLEX,
            0.6,
            scalar(BOX_COLOR),
            1,
            imgproc::LINE_8,
            false,
        )?;

        highgui::imshow(&self.window, &canvas)?;

        if highgui::wait_key(1)? == QUIT_KEY {
            Ok(LoopSignal::Stop)
        } else {
            Ok(LoopSignal::Continue)
        }
    }
}

impl Drop for DebugView {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.window);
    }
}

fn scalar((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// Copy an RGB frame into a BGR `Mat` for drawing and display.
fn frame_to_bgr(frame: &Frame) -> Result<Mat, opencv::Error> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;

    let stride = frame.width as usize * 3;
    for y in 0..frame.height as usize {
        for x in 0..frame.width as usize {
            let base = y * stride + x * 3;
            let (r, g, b) = (frame.data[base], frame.data[base + 1], frame.data[base + 2]);
            *mat.at_2d_mut::<Vec3b>(y as i32, x as i32)? = Vec3b::from([b, g, r]);
        }
    }

    Ok(mat)
}

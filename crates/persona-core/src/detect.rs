//! Detector output parsing.
//!
//! The face detector returns a flat float tensor of fixed-width records,
//! `[_, _, confidence, x_min, y_min, x_max, y_max]` with coordinates
//! normalized to the submitted frame, terminated by a `-1` sentinel or
//! by array exhaustion.

use crate::mapper::normalize_to_absolute;
use crate::types::DetectionBox;

/// Records at or below this confidence are discarded.
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

const RECORD_WIDTH: usize = 7;
const SENTINEL: f32 = -1.0;

/// Parse the detector's flat output into frame-space boxes.
///
/// Order is the detector's output order, not spatial. Zero boxes is a
/// valid result. Trailing partial records and records whose clamped box
/// has no area are dropped.
pub fn parse_detections(raw: &[f32], frame_width: u32, frame_height: u32) -> Vec<DetectionBox> {
    let end = raw
        .iter()
        .position(|&v| v == SENTINEL)
        .unwrap_or(raw.len());

    let mut boxes = Vec::new();

    for record in raw[..end].chunks_exact(RECORD_WIDTH) {
        let confidence = record[2];
        if confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let coords = normalize_to_absolute(frame_width, frame_height, &record[3..7]);
        let (x_min, y_min, x_max, y_max) = (coords[0], coords[1], coords[2], coords[3]);
        if x_max <= x_min || y_max <= y_min {
            tracing::trace!(x_min, y_min, x_max, y_max, "dropping degenerate detection record");
            continue;
        }

        boxes.push(DetectionBox {
            x_min,
            y_min,
            x_max,
            y_max,
            confidence: confidence.clamp(0.0, 1.0),
        });
    }

    boxes
}

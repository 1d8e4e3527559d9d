//! Landmark regression output parsing.
//!
//! The landmark model sees only the face crop, so its 10 floats are
//! normalized crop-local pairs. They are mapped to crop pixels against
//! the CROP dimensions, then into the frame through the owning box.

use crate::mapper::{local_to_frame, normalize_to_absolute};
use crate::types::{DetectionBox, LandmarkSet, Point};
use thiserror::Error;

/// The regression head emits 5 (x, y) pairs.
pub const LANDMARK_VALUES: usize = 10;

#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("landmark output too short: expected {LANDMARK_VALUES} values, got {0}")]
    ShortOutput(usize),
}

/// Map the raw regression output into a full-frame [`LandmarkSet`].
///
/// `crop_width`/`crop_height` are the dimensions of the crop that was
/// submitted; `origin` is the detection box that crop came from.
pub fn parse_landmarks(
    raw: &[f32],
    crop_width: u32,
    crop_height: u32,
    origin: &DetectionBox,
) -> Result<LandmarkSet, LandmarkError> {
    if raw.len() < LANDMARK_VALUES {
        return Err(LandmarkError::ShortOutput(raw.len()));
    }

    let local = normalize_to_absolute(crop_width, crop_height, &raw[..LANDMARK_VALUES]);
    let abs = local_to_frame(origin, &local);

    let point = |i: usize| Point {
        x: abs[i * 2],
        y: abs[i * 2 + 1],
    };

    Ok(LandmarkSet {
        left_eye: point(0),
        right_eye: point(1),
        nose: point(2),
        left_mouth: point(3),
        right_mouth: point(4),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_through_crop_then_frame() {
        let origin = DetectionBox {
            x_min: 100,
            y_min: 50,
            x_max: 200,
            y_max: 150,
            confidence: 0.9,
        };
        // Crop is 100x100; fractions land on easy pixels.
        let raw = [0.2, 0.3, 0.8, 0.3, 0.5, 0.5, 0.3, 0.7, 0.7, 0.7];
        let set = parse_landmarks(&raw, 100, 100, &origin).unwrap();

        assert_eq!(set.left_eye, Point { x: 120, y: 80 });
        assert_eq!(set.right_eye, Point { x: 180, y: 80 });
        assert_eq!(set.nose, Point { x: 150, y: 100 });
        assert_eq!(set.left_mouth, Point { x: 130, y: 120 });
        assert_eq!(set.right_mouth, Point { x: 170, y: 120 });
    }

    #[test]
    fn out_of_range_values_stay_inside_crop() {
        let origin = DetectionBox {
            x_min: 10,
            y_min: 10,
            x_max: 60,
            y_max: 60,
            confidence: 0.9,
        };
        let raw = [-0.5, 2.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5];
        let set = parse_landmarks(&raw, 50, 50, &origin).unwrap();
        // x clamps to 0, y clamps to 49 inside the crop, then offsets.
        assert_eq!(set.left_eye, Point { x: 10, y: 59 });
    }

    #[test]
    fn short_output_is_an_error() {
        let origin = DetectionBox {
            x_min: 0,
            y_min: 0,
            x_max: 10,
            y_max: 10,
            confidence: 0.9,
        };
        let err = parse_landmarks(&[0.5; 7], 10, 10, &origin).unwrap_err();
        assert!(matches!(err, LandmarkError::ShortOutput(7)));
    }
}

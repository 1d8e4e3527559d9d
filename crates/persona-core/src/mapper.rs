//! Coordinate remapping between detector output space, face-crop space,
//! and full-frame pixel space.

use crate::types::DetectionBox;

/// Convert alternating normalized x/y fractions into absolute pixel
/// coordinates.
///
/// Even indices scale by `width`, odd indices by `height`. Out-of-range
/// fractions (below 0 or above 1) clamp into `[0, dim)` rather than
/// erroring; detectors do emit them for faces touching the frame edge.
pub fn normalize_to_absolute(width: u32, height: u32, fractions: &[f32]) -> Vec<u32> {
    fractions
        .iter()
        .enumerate()
        .map(|(i, &f)| {
            let dim = if i % 2 == 0 { width } else { height };
            let scaled = (f * dim as f32) as i64;
            scaled.clamp(0, i64::from(dim.saturating_sub(1))) as u32
        })
        .collect()
}

/// Translate alternating crop-local x/y coordinates into full-frame
/// coordinates by adding the origin box's top-left corner.
///
/// The origin box is an explicit parameter: the caller always names
/// which detection a local coordinate belongs to, so a stale "current
/// box" can never leak between faces.
pub fn local_to_frame(origin: &DetectionBox, local: &[u32]) -> Vec<u32> {
    local
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i % 2 == 0 {
                origin.x_min + v
            } else {
                origin.y_min + v
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_scale_by_alternating_dimensions() {
        let out = normalize_to_absolute(200, 100, &[0.5, 0.5, 0.25, 0.75]);
        assert_eq!(out, vec![100, 50, 50, 75]);
    }

    #[test]
    fn output_stays_inside_dimension_for_any_fraction() {
        let width = 640u32;
        let height = 480u32;
        let fractions = [-3.0, -0.001, 0.0, 0.5, 0.999, 1.0, 1.5, 42.0];
        let out = normalize_to_absolute(width, height, &fractions);
        for (i, &v) in out.iter().enumerate() {
            let dim = if i % 2 == 0 { width } else { height };
            assert!(v < dim, "value {v} not below {dim} for fraction {}", fractions[i]);
        }
    }

    #[test]
    fn negative_fractions_clamp_to_zero() {
        let out = normalize_to_absolute(300, 300, &[-0.2, -1.0]);
        assert_eq!(out, vec![0, 0]);
    }

    #[test]
    fn full_fraction_clamps_below_dimension() {
        let out = normalize_to_absolute(300, 200, &[1.0, 1.0]);
        assert_eq!(out, vec![299, 199]);
    }

    #[test]
    fn local_offsets_add_box_corner_exactly() {
        let origin = DetectionBox {
            x_min: 40,
            y_min: 25,
            x_max: 140,
            y_max: 125,
            confidence: 1.0,
        };
        let out = local_to_frame(&origin, &[0, 0, 13, 7, 99, 99]);
        assert_eq!(out, vec![40, 25, 53, 32, 139, 124]);
    }

    #[test]
    fn local_to_frame_with_zero_origin_is_identity() {
        let origin = DetectionBox {
            x_min: 0,
            y_min: 0,
            x_max: 10,
            y_max: 10,
            confidence: 1.0,
        };
        assert_eq!(local_to_frame(&origin, &[3, 4]), vec![3, 4]);
    }
}

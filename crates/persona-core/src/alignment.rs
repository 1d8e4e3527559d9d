//! Canonical-pose alignment via a least-squares similarity transform.
//!
//! The five detected landmarks are mapped onto a fixed 128×128 template
//! (eye line horizontal, fixed inter-ocular distance), and the frame is
//! pulled through the inverse transform with bilinear sampling to
//! produce the patch the embedding model expects.

use crate::types::LandmarkSet;

/// Edge length of an aligned face patch.
pub const ALIGNED_SIZE: usize = 128;

/// Template landmark positions on the 128×128 output, in regression
/// output order (left eye, right eye, nose, left mouth, right mouth).
const TEMPLATE: [(f32, f32); 5] = [
    (43.7653, 59.0815),
    (84.0363, 58.8587),
    (64.0288, 81.9847),
    (47.4849, 105.5606),
    (80.8342, 105.3761),
];

/// Row-major 2×3 affine matrix `[a, -b, tx, b, a, ty]` encoding
/// scale + rotation (a, b) and translation (tx, ty).
type Transform = [f32; 6];

/// Warp an RGB frame so the given landmarks land on the template,
/// producing an `ALIGNED_SIZE`² patch. Out-of-frame samples are black.
pub fn align_face(rgb: &[u8], width: u32, height: u32, landmarks: &LandmarkSet) -> Vec<u8> {
    let points = landmarks.points();
    let src: [(f32, f32); 5] =
        std::array::from_fn(|i| (points[i].x as f32, points[i].y as f32));
    let transform = similarity_from_pairs(&src, &TEMPLATE);
    warp_rgb(rgb, width as usize, height as usize, &transform, ALIGNED_SIZE)
}

/// Least-squares 4-DOF similarity transform mapping `src` points onto
/// `dst` points.
///
/// Solved in closed form on centered coordinates: with centroids
/// removed, `a = Σ(cx·ex + cy·ey) / Σ|c|²` and
/// `b = Σ(cx·ey − cy·ex) / Σ|c|²`; the translation then re-anchors the
/// centroids. Collapsed source points fall back to identity.
fn similarity_from_pairs(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Transform {
    let n = src.len() as f32;

    let (mut sx, mut sy, mut dx, mut dy) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for i in 0..src.len() {
        sx += src[i].0;
        sy += src[i].1;
        dx += dst[i].0;
        dy += dst[i].1;
    }
    let (msx, msy) = (sx / n, sy / n);
    let (mdx, mdy) = (dx / n, dy / n);

    let mut cross_same = 0.0f32; // Σ(cx·ex + cy·ey)
    let mut cross_perp = 0.0f32; // Σ(cx·ey − cy·ex)
    let mut spread = 0.0f32; // Σ|c|²
    for i in 0..src.len() {
        let (cx, cy) = (src[i].0 - msx, src[i].1 - msy);
        let (ex, ey) = (dst[i].0 - mdx, dst[i].1 - mdy);
        cross_same += cx * ex + cy * ey;
        cross_perp += cx * ey - cy * ex;
        spread += cx * cx + cy * cy;
    }

    if spread < 1e-9 {
        return [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    }

    let a = cross_same / spread;
    let b = cross_perp / spread;
    let tx = mdx - a * msx + b * msy;
    let ty = mdy - b * msx - a * msy;

    [a, -b, tx, b, a, ty]
}

/// Apply a similarity transform to a 3-channel interleaved image,
/// sampling the source with bilinear interpolation.
fn warp_rgb(
    rgb: &[u8],
    src_width: usize,
    src_height: usize,
    transform: &Transform,
    out_size: usize,
) -> Vec<u8> {
    let (a, tx, b, ty) = (transform[0], transform[2], transform[3], transform[5]);

    // Invert the rotation-scale block [[a, -b], [b, a]].
    let det = a * a + b * b;
    if det < 1e-12 {
        return vec![0u8; out_size * out_size * 3];
    }
    let ia = a / det;
    let ib = b / det;

    let mut output = vec![0u8; out_size * out_size * 3];

    let sample = |x: i32, y: i32, c: usize| -> f32 {
        if x >= 0 && (x as usize) < src_width && y >= 0 && (y as usize) < src_height {
            rgb[(y as usize * src_width + x as usize) * 3 + c] as f32
        } else {
            0.0
        }
    };

    for oy in 0..out_size {
        for ox in 0..out_size {
            let rx = ox as f32 - tx;
            let ry = oy as f32 - ty;
            let src_x = ia * rx + ib * ry;
            let src_y = -ib * rx + ia * ry;

            let x0 = src_x.floor() as i32;
            let y0 = src_y.floor() as i32;
            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            for c in 0..3 {
                let top = sample(x0, y0, c) * (1.0 - fx) + sample(x0 + 1, y0, c) * fx;
                let bottom = sample(x0, y0 + 1, c) * (1.0 - fx) + sample(x0 + 1, y0 + 1, c) * fx;
                let value = top * (1.0 - fy) + bottom * fy;
                output[(oy * out_size + ox) * 3 + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn template_to_template_is_identity() {
        let m = similarity_from_pairs(&TEMPLATE, &TEMPLATE);
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-2, "tx = {}", m[2]);
        assert!((m[4] - 1.0).abs() < 1e-4, "a = {}", m[4]);
        assert!(m[5].abs() < 1e-2, "ty = {}", m[5]);
    }

    #[test]
    fn doubled_landmarks_halve_the_scale() {
        let src: [(f32, f32); 5] =
            std::array::from_fn(|i| (TEMPLATE[i].0 * 2.0, TEMPLATE[i].1 * 2.0));
        let m = similarity_from_pairs(&src, &TEMPLATE);
        assert!((m[0] - 0.5).abs() < 1e-3, "a = {}", m[0]);
    }

    #[test]
    fn collapsed_source_falls_back_to_identity() {
        let src = [(10.0, 10.0); 5];
        let m = similarity_from_pairs(&src, &TEMPLATE);
        assert_eq!(m, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn aligned_patch_has_fixed_size() {
        let frame = vec![90u8; 320 * 240 * 3];
        let landmarks = LandmarkSet {
            left_eye: Point { x: 100, y: 80 },
            right_eye: Point { x: 180, y: 80 },
            nose: Point { x: 140, y: 130 },
            left_mouth: Point { x: 110, y: 170 },
            right_mouth: Point { x: 170, y: 170 },
        };
        let aligned = align_face(&frame, 320, 240, &landmarks);
        assert_eq!(aligned.len(), ALIGNED_SIZE * ALIGNED_SIZE * 3);
    }

    #[test]
    fn bright_patch_lands_near_its_template_point() {
        let (w, h) = (240usize, 240usize);
        let mut frame = vec![0u8; w * h * 3];

        let landmarks = LandmarkSet {
            left_eye: Point { x: 90, y: 70 },
            right_eye: Point { x: 150, y: 70 },
            nose: Point { x: 120, y: 105 },
            left_mouth: Point { x: 98, y: 140 },
            right_mouth: Point { x: 142, y: 140 },
        };

        // Paint a 5x5 white patch around the left eye.
        for dy in -2i32..=2 {
            for dx in -2i32..=2 {
                let x = (90 + dx) as usize;
                let y = (70 + dy) as usize;
                for c in 0..3 {
                    frame[(y * w + x) * 3 + c] = 255;
                }
            }
        }

        let aligned = align_face(&frame, w as u32, h as u32, &landmarks);

        let (ref_x, ref_y) = (TEMPLATE[0].0.round() as usize, TEMPLATE[0].1.round() as usize);
        let mut brightest = 0u8;
        for y in ref_y.saturating_sub(2)..=(ref_y + 2).min(ALIGNED_SIZE - 1) {
            for x in ref_x.saturating_sub(2)..=(ref_x + 2).min(ALIGNED_SIZE - 1) {
                brightest = brightest.max(aligned[(y * ALIGNED_SIZE + x) * 3]);
            }
        }
        assert!(
            brightest > 100,
            "expected bright pixels near ({ref_x}, {ref_y}), max {brightest}"
        );
    }
}

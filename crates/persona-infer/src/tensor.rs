//! Tensor preparation for stage inputs.

use ndarray::Array4;

/// Planar NCHW float tensor submitted to a stage.
pub type InputTensor = Array4<f32>;

/// A tensor tagged with the input layer it binds to.
#[derive(Debug, Clone)]
pub struct NamedTensor {
    pub name: String,
    pub data: InputTensor,
}

/// Interleave RGB bytes into a planar 1×3×H×W float tensor.
///
/// Values stay in the raw 0–255 range; per-model normalization is part
/// of the engine's input contract, not ours.
pub fn to_planar(rgb: &[u8], width: usize, height: usize) -> InputTensor {
    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

    for y in 0..height {
        for x in 0..width {
            let base = (y * width + x) * 3;
            for c in 0..3 {
                let value = rgb.get(base + c).copied().unwrap_or(0);
                tensor[[0, c, y, x]] = value as f32;
            }
        }
    }

    tensor
}

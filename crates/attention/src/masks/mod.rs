//! Additive mask builders shared by the attention layers.
//!
//! All masks produced here are additive `f32` tensors: entries are `0.0`
//! where attention is permitted and `f32::NEG_INFINITY` where it is not, so
//! they can be added onto raw scores before the softmax. Builders return
//! shapes that broadcast against `[batch, n_heads, q_len, k_len]` score
//! tensors.

pub mod causal;
pub mod padding;

use candle_core::{DType, Result, Tensor};

/// Dtype shared by all additive masks.
pub const MASK_DTYPE: DType = DType::F32;

pub use causal::{causal_bias_table, slice_causal_bias};
pub use padding::{key_padding_bias, key_padding_bias_from_lengths};

/// Merge optional padding and causal biases into a single additive mask
/// broadcast to `shape` (`(batch, 1, q_len, k_len)` at the call sites).
///
/// Returns `None` when neither bias is present so callers can skip the
/// masking step entirely.
pub fn combine_biases(
    padding: Option<&Tensor>,
    causal: Option<&Tensor>,
    shape: (usize, usize, usize, usize),
) -> Result<Option<Tensor>> {
    match (padding, causal) {
        (None, None) => Ok(None),
        (Some(pad), None) => Ok(Some(pad.broadcast_as(shape)?)),
        (None, Some(causal)) => Ok(Some(causal.broadcast_as(shape)?)),
        (Some(pad), Some(causal)) => {
            let merged = pad.broadcast_add(causal)?;
            Ok(Some(merged.broadcast_as(shape)?))
        }
    }
}

#[cfg(test)]
mod tests;

//! Key-side padding biases.
//!
//! Padding masks arrive from the data pipeline as `(batch, k_len)` tensors
//! with `1` marking valid content and `0` marking filler. The builders here
//! convert them to the additive convention described in [`super`], shaped
//! `(batch, 1, 1, k_len)` so they broadcast across heads and query positions.

use candle_core::{DType, Error, Result, Tensor};

use super::MASK_DTYPE;

/// Convert a `(batch, k_len)` validity mask into an additive key bias.
///
/// Any numeric dtype is accepted; entries are thresholded at `0.5` so both
/// integer and float `0`/`1` encodings work.
pub fn key_padding_bias(mask: &Tensor) -> Result<Tensor> {
    let (batch, k_len) = mask.dims2().map_err(|_| {
        Error::Msg(format!(
            "padding mask must be shaped (batch, k_len), got {:?}",
            mask.dims()
        ))
    })?;
    let valid = mask.to_dtype(DType::F32)?.gt(0.5)?;
    let keep = Tensor::zeros((batch, k_len), MASK_DTYPE, mask.device())?;
    let drop = Tensor::full(f32::NEG_INFINITY, (batch, k_len), mask.device())?;
    let bias = valid.where_cond(&keep, &drop)?;
    bias.unsqueeze(1)?.unsqueeze(2)
}

/// Build an additive key bias from per-batch valid key lengths.
pub fn key_padding_bias_from_lengths(
    device: &candle_core::Device,
    key_lengths: &[usize],
    k_len: usize,
) -> Result<Tensor> {
    let batch = key_lengths.len();
    let mut data = vec![0f32; batch * k_len];
    for (b, &valid) in key_lengths.iter().enumerate() {
        for k in valid.min(k_len)..k_len {
            data[b * k_len + k] = f32::NEG_INFINITY;
        }
    }
    Tensor::from_vec(data, (batch, k_len), device)?
        .unsqueeze(1)?
        .unsqueeze(2)
}

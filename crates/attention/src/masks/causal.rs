//! Causal (lower-triangular) attention bias.
//!
//! The table is built once per layer at construction time and sliced per
//! forward call, so no triangular mask is recomputed on the hot path.

use candle_core::{Error, Result, Tensor};

use super::MASK_DTYPE;

/// Build the full `(max_len, max_len)` causal bias table.
///
/// Entry `(q, k)` is `0.0` for `k <= q` (a position may attend to itself and
/// everything before it) and `f32::NEG_INFINITY` for `k > q`.
pub fn causal_bias_table(device: &candle_core::Device, max_len: usize) -> Result<Tensor> {
    if max_len == 0 {
        return Err(Error::Msg("causal table requires max_len > 0".into()));
    }
    let mut data = vec![0f32; max_len * max_len];
    for q in 0..max_len {
        for k in (q + 1)..max_len {
            data[q * max_len + k] = f32::NEG_INFINITY;
        }
    }
    Tensor::from_vec(data, (max_len, max_len), device)
}

/// Slice the precomputed table down to `(1, 1, q_len, k_len)` for the current
/// call. Fails when either length exceeds the table capacity, since the table
/// cannot be extended after construction.
pub fn slice_causal_bias(table: &Tensor, q_len: usize, k_len: usize) -> Result<Tensor> {
    let (rows, cols) = table.dims2()?;
    if table.dtype() != MASK_DTYPE {
        return Err(Error::Msg(format!(
            "causal table expects dtype {MASK_DTYPE:?}, got {:?}",
            table.dtype()
        )));
    }
    if q_len > rows || k_len > cols {
        return Err(Error::Msg(format!(
            "sequence length ({q_len}, {k_len}) exceeds causal table capacity ({rows}, {cols})"
        )));
    }
    table
        .narrow(0, 0, q_len)?
        .narrow(1, 0, k_len)?
        .unsqueeze(0)?
        .unsqueeze(0)
}

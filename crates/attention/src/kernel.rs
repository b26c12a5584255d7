//! Exact masked scaled dot-product attention.
//!
//! The kernel prioritises numerical fidelity: scores are computed in `f32`,
//! masked positions receive an additive `−∞` before the softmax so their
//! weight is exactly zero, and query rows whose keys are all masked are
//! defined to produce a zero weight row rather than a NaN softmax. This is
//! the correctness baseline every other code path is measured against.

use std::sync::OnceLock;

use candle_core::{DType, Tensor, D};
use candle_nn::ops::{dropout, softmax_last_dim};

use crate::core::{Attention, AttentionError, KernelConfig};
use crate::masks::MASK_DTYPE;

/// Portable masked attention kernel.
#[derive(Debug, Default)]
pub struct ScaledDotProduct {
    first_call: OnceLock<()>,
}

impl ScaledDotProduct {
    pub fn new() -> Self {
        Self {
            first_call: OnceLock::new(),
        }
    }

    /// Normalized attention weights shaped `[batch, n_heads, q_len, k_len]`.
    ///
    /// Each row is a probability distribution over key positions. Masked
    /// positions carry exactly zero weight; a row whose keys are all masked
    /// comes back as all zeros instead of NaN.
    pub fn weights(
        &self,
        q: &Tensor,
        k: &Tensor,
        bias: Option<&Tensor>,
        config: &KernelConfig,
    ) -> Result<Tensor, AttentionError> {
        let (batch, heads, q_len, head_dim) = dims4(q, "q")?;
        let (kb, kh, k_len, kd) = dims4(k, "k")?;
        if kb != batch || kh != heads || kd != head_dim {
            return Err(AttentionError::shape(format!(
                "k: expected [{batch}, {heads}, ?, {head_dim}], got [{kb}, {kh}, {k_len}, {kd}]"
            )));
        }

        let merged = batch * heads;
        let q_view = q.to_dtype(DType::F32)?.reshape((merged, q_len, head_dim))?;
        let k_view = k.to_dtype(DType::F32)?.reshape((merged, k_len, head_dim))?;

        let scale = 1.0 / (head_dim as f64).sqrt();
        let scores = q_view.matmul(&k_view.transpose(1, 2)?)?;
        let mut scores = scores
            .affine(scale, 0.0)?
            .reshape((batch, heads, q_len, k_len))?;

        if let Some(bias) = bias {
            validate_bias(bias, batch, heads, q_len, k_len, q)?;
            scores = scores.broadcast_add(bias)?;
        }

        // Rows with no open key would feed an all-(-inf) row to the softmax.
        // Replace them with zeros before normalising, then zero the resulting
        // uniform row so masked-out queries emit nothing.
        let row_max = scores.max_keepdim(D::Minus1)?;
        let live = row_max.gt(f64::NEG_INFINITY)?;
        let live_rows = live.to_dtype(DType::F32)?;
        let live_grid = live.broadcast_as(scores.shape())?;
        let safe = live_grid.where_cond(&scores, &scores.zeros_like()?)?;

        let probs = softmax_last_dim(&safe.reshape((merged, q_len, k_len))?)?
            .reshape((batch, heads, q_len, k_len))?;
        let probs = probs.broadcast_mul(&live_rows)?;

        match config.dropout_p {
            None => Ok(probs),
            Some(p) if !(0.0..1.0).contains(&p) => Err(AttentionError::Config {
                message: format!("dropout probability must be in [0, 1), got {p}"),
            }),
            Some(p) if p > 0.0 => Ok(dropout(&probs, p)?),
            Some(_) => Ok(probs),
        }
    }
}

impl Attention for ScaledDotProduct {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        bias: Option<&Tensor>,
        config: &KernelConfig,
    ) -> Result<Tensor, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention kernel init dropout_p={:?} dtype={:?}",
                config.dropout_p,
                q.dtype()
            );
        }

        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::shape(
                "q, k, v must reside on the same device",
            ));
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::shape("q, k, v must share the same dtype"));
        }
        if !matches!(dtype, DType::F32 | DType::F16 | DType::BF16) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }

        let (batch, heads, q_len, head_dim) = dims4(q, "q")?;
        let (vb, vh, v_len, vd) = dims4(v, "v")?;
        let (_, _, k_len, _) = dims4(k, "k")?;
        if vb != batch || vh != heads || v_len != k_len || vd != head_dim {
            return Err(AttentionError::shape(format!(
                "v: expected [{batch}, {heads}, {k_len}, {head_dim}], got [{vb}, {vh}, {v_len}, {vd}]"
            )));
        }

        let probs = self.weights(q, k, bias, config)?;

        let merged = batch * heads;
        let probs_view = probs.reshape((merged, q_len, k_len))?;
        let v_view = v.to_dtype(DType::F32)?.reshape((merged, k_len, head_dim))?;
        let output = probs_view
            .matmul(&v_view)?
            .reshape((batch, heads, q_len, head_dim))?;

        Ok(output.to_dtype(dtype)?)
    }
}

fn dims4(tensor: &Tensor, name: &str) -> Result<(usize, usize, usize, usize), AttentionError> {
    tensor.dims4().map_err(|_| {
        AttentionError::shape(format!(
            "{name} must have shape [batch, heads, seq_len, head_dim], got {:?}",
            tensor.dims()
        ))
    })
}

fn validate_bias(
    bias: &Tensor,
    batch: usize,
    heads: usize,
    q_len: usize,
    k_len: usize,
    q: &Tensor,
) -> Result<(), AttentionError> {
    if !q.device().same_device(bias.device()) {
        return Err(AttentionError::shape(
            "bias must reside on the same device as q",
        ));
    }
    if bias.dtype() != MASK_DTYPE {
        return Err(AttentionError::UnsupportedDType {
            requested: format!("bias expects dtype {MASK_DTYPE:?}, got {:?}", bias.dtype()),
        });
    }
    let (mb, mh, mq, mk) = dims4(bias, "bias")?;
    let broadcastable = |dim: usize, full: usize| dim == 1 || dim == full;
    if mk != k_len
        || !broadcastable(mq, q_len)
        || !broadcastable(mb, batch)
        || !broadcastable(mh, heads)
    {
        return Err(AttentionError::shape(format!(
            "bias: expected [1|{batch}, 1|{heads}, 1|{q_len}, {k_len}], got [{mb}, {mh}, {mq}, {mk}]"
        )));
    }
    Ok(())
}

//! Core trait and types shared by attention kernels.
//!
//! Implementations operate on tensors with layout
//! `[batch, n_heads, seq_len, head_dim]`. The output mirrors the query layout
//! and dtype; score computation and the softmax reduction happen in `f32`
//! regardless of the incoming dtype.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::KernelConfig;
pub use errors::AttentionError;

/// Unified interface for attention kernels.
///
/// * `q` is shaped `[batch, n_heads, q_len, head_dim]`; `k` and `v` share the
///   layout with `k_len` in place of `q_len`.
/// * `bias`, when present, is an additive mask with `0.0`/`−∞` entries,
///   shaped `[batch, n_heads, q_len, k_len]` where every dimension except
///   `k_len` may be `1` and broadcast.
/// * The returned tensor is `[batch, n_heads, q_len, head_dim]` in the dtype
///   of `q`.
pub trait Attention {
    /// Compute masked attention over the provided projections.
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        bias: Option<&Tensor>,
        config: &KernelConfig,
    ) -> Result<Tensor, AttentionError>;
}

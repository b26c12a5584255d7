//! Masked multi-head attention for the seqformer workspace.
//!
//! The crate provides the pieces the encoder and decoder stacks share:
//! additive mask builders (causal table, key-side padding), an exact scaled
//! dot-product kernel operating on tensors with layout
//! `[batch, n_heads, seq_len, head_dim]`, and the multi-head projection layer
//! that wraps the kernel for self-attention and cross-attention alike.
//!
//! Masks are additive `f32` tensors: `0.0` where attention is permitted and
//! `f32::NEG_INFINITY` where it is not. A query row whose keys are all masked
//! is detected by the kernel and produces an all-zero weight row (and hence a
//! zero output vector) instead of a NaN softmax; see
//! [`ScaledDotProduct::weights`].
//!
//! Dropout on the attention weights is a train-only concern controlled via
//! [`KernelConfig`]; with it disabled the computation is deterministic.

pub mod core;
pub mod kernel;
pub mod masks;
pub mod multi_head;

pub use core::{Attention, AttentionError, KernelConfig};
pub use kernel::ScaledDotProduct;
pub use multi_head::{AttentionConfig, MultiHeadAttention};

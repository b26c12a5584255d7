//! Multi-head attention layer.
//!
//! One layer serves the three call sites of the transformer: encoder
//! self-attention, decoder causal self-attention, and decoder cross-attention.
//! The variants differ only in which tensors feed the query and key/value
//! projections and in whether the causal table applies, so the layer takes a
//! query source and a key/value source per call and a `causal` flag at
//! construction.

use candle_core::{bail, Error, Result, Tensor};
use candle_nn::{linear, linear_no_bias, Dropout, Linear, Module, VarBuilder};

use crate::core::{Attention, KernelConfig};
use crate::kernel::ScaledDotProduct;
use crate::masks;

/// Dimensions and dropout shared by every attention layer in a stack.
#[derive(Debug, Clone, Copy)]
pub struct AttentionConfig {
    /// Model (embedding) dimension of the residual stream.
    pub hidden_dim: usize,
    /// Number of parallel heads.
    pub n_heads: usize,
    /// Per-head key/query/value dimension.
    pub head_dim: usize,
    /// Longest sequence the stack supports; sizes the causal table.
    pub max_seq_len: usize,
    /// Dropout probability for attention weights and the projected output.
    pub dropout_p: f32,
}

impl AttentionConfig {
    /// Total width of the packed head projections (`n_heads * head_dim`).
    pub fn projection_dim(&self) -> usize {
        self.n_heads * self.head_dim
    }
}

/// Scaled dot-product multi-head attention with optional causal masking.
#[derive(Debug)]
pub struct MultiHeadAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    kernel: ScaledDotProduct,
    causal_bias: Option<Tensor>,
    proj_dropout: Dropout,
    n_heads: usize,
    head_dim: usize,
    dropout_p: f32,
}

impl MultiHeadAttention {
    /// Build the projection weights under `vb`. When `causal` is set the
    /// layer owns a precomputed `(max_seq_len, max_seq_len)` bias table that
    /// is sliced per call.
    pub fn new(config: AttentionConfig, causal: bool, vb: VarBuilder) -> Result<Self> {
        if config.n_heads == 0 || config.head_dim == 0 {
            bail!("attention requires n_heads > 0 and head_dim > 0");
        }
        let proj = config.projection_dim();
        let query = linear_no_bias(config.hidden_dim, proj, vb.pp("query"))?;
        let key = linear_no_bias(config.hidden_dim, proj, vb.pp("key"))?;
        let value = linear_no_bias(config.hidden_dim, proj, vb.pp("value"))?;
        let output = linear(proj, config.hidden_dim, vb.pp("out"))?;

        let causal_bias = if causal {
            Some(masks::causal_bias_table(vb.device(), config.max_seq_len)?)
        } else {
            None
        };

        Ok(Self {
            query,
            key,
            value,
            output,
            kernel: ScaledDotProduct::new(),
            causal_bias,
            proj_dropout: Dropout::new(config.dropout_p),
            n_heads: config.n_heads,
            head_dim: config.head_dim,
            dropout_p: config.dropout_p,
        })
    }

    /// Whether the layer applies the causal restriction.
    pub fn is_causal(&self) -> bool {
        self.causal_bias.is_some()
    }

    fn split_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = tensor.dims3()?;
        tensor
            .reshape((batch, seq, self.n_heads, self.head_dim))?
            .permute((0, 2, 1, 3))?
            .contiguous()
    }

    fn merge_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, _heads, seq, _head_dim) = tensor.dims4()?;
        tensor
            .permute((0, 2, 1, 3))?
            .contiguous()?
            .reshape((batch, seq, self.n_heads * self.head_dim))
    }

    /// Attend from `query_src` over `key_value_src`.
    ///
    /// Self-attention passes the same tensor for both; cross-attention passes
    /// the decoder stream as `query_src` and the encoder output as
    /// `key_value_src`. `key_padding_mask` is the `(batch, k_len)` 0/1
    /// validity mask for the key/value side.
    pub fn forward(
        &self,
        query_src: &Tensor,
        key_value_src: &Tensor,
        key_padding_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let (batch, q_len, _) = query_src.dims3()?;
        let (kv_batch, k_len, _) = key_value_src.dims3()?;
        if kv_batch != batch {
            bail!(
                "query batch {} does not match key/value batch {}",
                batch,
                kv_batch
            );
        }
        if let Some(mask) = key_padding_mask {
            let (mask_batch, mask_len) = mask.dims2()?;
            if mask_batch != batch || mask_len != k_len {
                bail!(
                    "padding mask shaped {:?} does not match key/value shape ({}, {})",
                    mask.dims(),
                    batch,
                    k_len
                );
            }
        }

        let q = self.split_heads(&self.query.forward(query_src)?)?;
        let k = self.split_heads(&self.key.forward(key_value_src)?)?;
        let v = self.split_heads(&self.value.forward(key_value_src)?)?;

        let padding = match key_padding_mask {
            Some(mask) => Some(masks::key_padding_bias(mask)?),
            None => None,
        };
        let causal = match &self.causal_bias {
            Some(table) => Some(masks::slice_causal_bias(table, q_len, k_len)?),
            None => None,
        };
        let bias =
            masks::combine_biases(padding.as_ref(), causal.as_ref(), (batch, 1, q_len, k_len))?;

        let kernel_config = KernelConfig {
            dropout_p: if train && self.dropout_p > 0.0 {
                Some(self.dropout_p)
            } else {
                None
            },
        };
        let attended = self
            .kernel
            .attend(&q, &k, &v, bias.as_ref(), &kernel_config)
            .map_err(|err| Error::Msg(err.to_string()))?;

        let merged = self.merge_heads(&attended)?;
        let projected = self.output.forward(&merged)?;
        if train {
            self.proj_dropout.forward(&projected, train)
        } else {
            Ok(projected)
        }
    }
}

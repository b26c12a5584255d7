use candle_core::{Error, Result};

use attention::AttentionConfig;

/// Construction parameters shared by the encoder and decoder stacks.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Number of distinct token ids.
    pub vocab_size: usize,
    /// Longest sequence the positional and causal tables support.
    pub max_seq_len: usize,
    /// Model (embedding) dimension.
    pub hidden_dim: usize,
    /// Per-head key/query/value dimension.
    pub head_dim: usize,
    /// Number of attention heads.
    pub n_heads: usize,
    /// Number of blocks in the stack.
    pub n_layers: usize,
    /// Dropout probability used throughout the stack.
    pub dropout_p: f32,
}

impl ModelConfig {
    /// Reject invalid dimension combinations at construction time instead of
    /// letting them surface as shape failures deep inside a forward pass.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(Error::Msg("vocab_size must be greater than zero".into()));
        }
        if self.max_seq_len == 0 {
            return Err(Error::Msg("max_seq_len must be greater than zero".into()));
        }
        if self.hidden_dim == 0 {
            return Err(Error::Msg("hidden_dim must be greater than zero".into()));
        }
        if self.head_dim == 0 {
            return Err(Error::Msg("head_dim must be greater than zero".into()));
        }
        if self.n_heads == 0 {
            return Err(Error::Msg("n_heads must be greater than zero".into()));
        }
        if self.n_layers == 0 {
            return Err(Error::Msg("n_layers must be greater than zero".into()));
        }
        if self.n_heads * self.head_dim != self.hidden_dim {
            return Err(Error::Msg(format!(
                "hidden_dim ({}) must equal n_heads ({}) * head_dim ({})",
                self.hidden_dim, self.n_heads, self.head_dim
            )));
        }
        if !(0.0..1.0).contains(&self.dropout_p) {
            return Err(Error::Msg("dropout_p must be in [0, 1)".into()));
        }
        Ok(())
    }

    pub(crate) fn attention(&self) -> AttentionConfig {
        AttentionConfig {
            hidden_dim: self.hidden_dim,
            n_heads: self.n_heads,
            head_dim: self.head_dim,
            max_seq_len: self.max_seq_len,
            dropout_p: self.dropout_p,
        }
    }
}

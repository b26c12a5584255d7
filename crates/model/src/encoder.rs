//! Encoder stack.

use candle_core::{Error, Result, Tensor};
use candle_nn::{layer_norm, LayerNorm, Module, VarBuilder};

use embedding::{SinusoidalEncoding, TokenEmbedding};

use crate::block::EncoderBlock;
use crate::config::ModelConfig;

/// Token ids in, contextual representations out.
///
/// Embeds the ids, adds the sinusoidal position signal, applies the block
/// stack sequentially, and finishes with a layer normalization. Attention is
/// bidirectional over padding-valid positions only.
pub struct Encoder {
    embedding: TokenEmbedding,
    positional: SinusoidalEncoding,
    blocks: Vec<EncoderBlock>,
    final_norm: LayerNorm,
    config: ModelConfig,
}

impl Encoder {
    pub fn new(config: ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let embedding = TokenEmbedding::new(config.vocab_size, config.hidden_dim, vb.pp("embed"))?;
        let positional = SinusoidalEncoding::new(
            config.hidden_dim,
            config.max_seq_len,
            config.dropout_p,
            vb.device(),
        )?;
        let mut blocks = Vec::with_capacity(config.n_layers);
        for layer in 0..config.n_layers {
            blocks.push(EncoderBlock::new(&config, vb.pp(format!("block_{layer}")))?);
        }
        let final_norm = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln_f"))?;
        Ok(Self {
            embedding,
            positional,
            blocks,
            final_norm,
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Produce `(batch, seq, hidden_dim)` representations for the ids.
    pub fn forward(
        &self,
        token_ids: &Tensor,
        padding_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let (batch, seq) = token_ids.dims2()?;
        check_sequence(seq, self.config.max_seq_len)?;
        check_mask(padding_mask, batch, seq)?;

        let mut hidden = self.embedding.forward(token_ids)?;
        hidden = self.positional.forward(&hidden, train)?;
        for block in &self.blocks {
            hidden = block.forward(&hidden, padding_mask, train)?;
        }
        self.final_norm.forward(&hidden)
    }
}

pub(crate) fn check_sequence(seq: usize, max_seq_len: usize) -> Result<()> {
    if seq > max_seq_len {
        return Err(Error::Msg(format!(
            "sequence length {seq} exceeds the configured maximum {max_seq_len}"
        )));
    }
    Ok(())
}

pub(crate) fn check_mask(mask: Option<&Tensor>, batch: usize, seq: usize) -> Result<()> {
    if let Some(mask) = mask {
        let (mask_batch, mask_seq) = mask.dims2().map_err(|_| {
            Error::Msg(format!(
                "padding mask must be shaped (batch, seq), got {:?}",
                mask.dims()
            ))
        })?;
        if mask_batch != batch || mask_seq != seq {
            return Err(Error::Msg(format!(
                "padding mask shaped ({mask_batch}, {mask_seq}) does not match ids ({batch}, {seq})"
            )));
        }
    }
    Ok(())
}

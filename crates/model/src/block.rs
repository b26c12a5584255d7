//! Encoder and decoder blocks.
//!
//! Both blocks use the add-then-normalize residual layout:
//! `x = Norm(x + Sublayer(x))` for each sublayer, followed by a final
//! dropout. The decoder block carries an extra cross-attention sublayer when
//! it is assembled for seq2seq use; without it the same block family acts as
//! a pure language model.

use candle_core::{bail, Result, Tensor};
use candle_nn::{layer_norm, Dropout, LayerNorm, Module, VarBuilder};

use attention::MultiHeadAttention;

use crate::config::ModelConfig;
use crate::decoder::EncoderContext;
use crate::feed_forward::FeedForward;

/// Bidirectional self-attention + feed-forward with residual normalization.
#[derive(Debug)]
pub struct EncoderBlock {
    self_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    norm_attn: LayerNorm,
    norm_ff: LayerNorm,
    dropout: Dropout,
}

impl EncoderBlock {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let self_attn = MultiHeadAttention::new(config.attention(), false, vb.pp("attn"))?;
        let feed_forward = FeedForward::new(config.hidden_dim, config.dropout_p, vb.pp("mlp"))?;
        let norm_attn = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln1"))?;
        let norm_ff = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln2"))?;
        Ok(Self {
            self_attn,
            feed_forward,
            norm_attn,
            norm_ff,
            dropout: Dropout::new(config.dropout_p),
        })
    }

    pub fn forward(
        &self,
        hidden: &Tensor,
        padding_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let attended = self.self_attn.forward(hidden, hidden, padding_mask, train)?;
        let hidden = self.norm_attn.forward(&hidden.add(&attended)?)?;

        let fed = self.feed_forward.forward(&hidden, train)?;
        let hidden = self.norm_ff.forward(&hidden.add(&fed)?)?;

        if train {
            self.dropout.forward(&hidden, train)
        } else {
            Ok(hidden)
        }
    }
}

/// Causal self-attention, optional cross-attention over the encoder output,
/// then feed-forward; each sublayer residual-normalized in that fixed order.
#[derive(Debug)]
pub struct DecoderBlock {
    self_attn: MultiHeadAttention,
    cross: Option<(MultiHeadAttention, LayerNorm)>,
    feed_forward: FeedForward,
    norm_self: LayerNorm,
    norm_ff: LayerNorm,
    dropout: Dropout,
}

impl DecoderBlock {
    pub fn new(config: &ModelConfig, cross_attention: bool, vb: VarBuilder) -> Result<Self> {
        let self_attn = MultiHeadAttention::new(config.attention(), true, vb.pp("attn"))?;
        let cross = if cross_attention {
            let attn = MultiHeadAttention::new(config.attention(), false, vb.pp("cross_attn"))?;
            let norm = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln_cross"))?;
            Some((attn, norm))
        } else {
            None
        };
        let feed_forward = FeedForward::new(config.hidden_dim, config.dropout_p, vb.pp("mlp"))?;
        let norm_self = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln1"))?;
        let norm_ff = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln2"))?;
        Ok(Self {
            self_attn,
            cross,
            feed_forward,
            norm_self,
            norm_ff,
            dropout: Dropout::new(config.dropout_p),
        })
    }

    pub fn forward(
        &self,
        hidden: &Tensor,
        padding_mask: Option<&Tensor>,
        context: Option<&EncoderContext>,
        train: bool,
    ) -> Result<Tensor> {
        let attended = self.self_attn.forward(hidden, hidden, padding_mask, train)?;
        let mut hidden = self.norm_self.forward(&hidden.add(&attended)?)?;

        match (&self.cross, context) {
            (Some((cross_attn, norm_cross)), Some(ctx)) => {
                // Queries come from the decoder stream; keys and values from
                // the encoder output, masked by the encoder's padding mask.
                let attended = cross_attn.forward(&hidden, ctx.hidden, ctx.padding_mask, train)?;
                hidden = norm_cross.forward(&hidden.add(&attended)?)?;
            }
            (None, None) => {}
            (Some(_), None) => {
                bail!("decoder block was built with cross-attention but no encoder context was supplied")
            }
            (None, Some(_)) => {
                bail!("decoder block without cross-attention cannot consume an encoder context")
            }
        }

        let fed = self.feed_forward.forward(&hidden, train)?;
        let hidden = self.norm_ff.forward(&hidden.add(&fed)?)?;

        if train {
            self.dropout.forward(&hidden, train)
        } else {
            Ok(hidden)
        }
    }
}

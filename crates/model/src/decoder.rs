//! Decoder stack.

use candle_core::{bail, Device, Error, Result, Tensor};
use candle_nn::{layer_norm, linear, LayerNorm, Linear, Module, VarBuilder};

use embedding::{SinusoidalEncoding, TokenEmbedding};

use crate::block::DecoderBlock;
use crate::config::ModelConfig;
use crate::encoder::{check_mask, check_sequence};

/// How a decoder stack is wired at construction.
///
/// The two modes are distinct configurations of the same block family, not
/// interchangeable at call time: a language-model decoder has no
/// cross-attention parameters at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderMode {
    /// Causal self-attention only.
    LanguageModel,
    /// Causal self-attention plus cross-attention over an encoder output.
    Seq2Seq,
}

/// Encoder output and its padding mask, computed once and held constant
/// while the decoder runs.
#[derive(Debug, Clone, Copy)]
pub struct EncoderContext<'a> {
    /// Encoder representations shaped `(batch, enc_seq, hidden_dim)`.
    pub hidden: &'a Tensor,
    /// The encoder-side `(batch, enc_seq)` 0/1 validity mask.
    pub padding_mask: Option<&'a Tensor>,
}

/// Token ids in, next-token logits out.
pub struct Decoder {
    embedding: TokenEmbedding,
    positional: SinusoidalEncoding,
    blocks: Vec<DecoderBlock>,
    final_norm: LayerNorm,
    lm_head: Linear,
    mode: DecoderMode,
    config: ModelConfig,
    device: Device,
}

impl Decoder {
    pub fn new(config: ModelConfig, mode: DecoderMode, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let embedding = TokenEmbedding::new(config.vocab_size, config.hidden_dim, vb.pp("embed"))?;
        let positional = SinusoidalEncoding::new(
            config.hidden_dim,
            config.max_seq_len,
            config.dropout_p,
            vb.device(),
        )?;
        let cross_attention = matches!(mode, DecoderMode::Seq2Seq);
        let mut blocks = Vec::with_capacity(config.n_layers);
        for layer in 0..config.n_layers {
            blocks.push(DecoderBlock::new(
                &config,
                cross_attention,
                vb.pp(format!("block_{layer}")),
            )?);
        }
        let final_norm = layer_norm(config.hidden_dim, 1e-5, vb.pp("ln_f"))?;
        let lm_head = linear(config.hidden_dim, config.vocab_size, vb.pp("lm_head"))?;
        let device = vb.device().clone();
        Ok(Self {
            embedding,
            positional,
            blocks,
            final_norm,
            lm_head,
            mode,
            config,
            device,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Produce unnormalized `(batch, seq, vocab_size)` logits.
    ///
    /// `context` must be present exactly when the decoder was built in
    /// [`DecoderMode::Seq2Seq`]; the modes are mutually exclusive and a
    /// mismatch is rejected rather than reinterpreted.
    pub fn forward(
        &self,
        token_ids: &Tensor,
        padding_mask: Option<&Tensor>,
        context: Option<&EncoderContext>,
        train: bool,
    ) -> Result<Tensor> {
        match (self.mode, context) {
            (DecoderMode::LanguageModel, Some(_)) => {
                bail!("decoder was built in language-model mode and cannot take an encoder context")
            }
            (DecoderMode::Seq2Seq, None) => {
                bail!("decoder was built in seq2seq mode and requires an encoder context")
            }
            _ => {}
        }

        let (batch, seq) = token_ids.dims2()?;
        check_sequence(seq, self.config.max_seq_len)?;
        check_mask(padding_mask, batch, seq)?;
        if let Some(ctx) = context {
            self.check_context(ctx, batch)?;
        }

        let mut hidden = self.embedding.forward(token_ids)?;
        hidden = self.positional.forward(&hidden, train)?;
        for block in &self.blocks {
            hidden = block.forward(&hidden, padding_mask, context, train)?;
        }
        let normalized = self.final_norm.forward(&hidden)?;
        self.lm_head.forward(&normalized)
    }

    fn check_context(&self, ctx: &EncoderContext, batch: usize) -> Result<()> {
        let (ctx_batch, enc_seq, ctx_hidden) = ctx.hidden.dims3().map_err(|_| {
            Error::Msg(format!(
                "encoder context must be shaped (batch, enc_seq, hidden), got {:?}",
                ctx.hidden.dims()
            ))
        })?;
        if ctx_batch != batch {
            return Err(Error::Msg(format!(
                "encoder context batch {ctx_batch} does not match decoder batch {batch}"
            )));
        }
        if ctx_hidden != self.config.hidden_dim {
            return Err(Error::Msg(format!(
                "encoder context hidden dim {ctx_hidden} does not match model hidden dim {}",
                self.config.hidden_dim
            )));
        }
        check_mask(ctx.padding_mask, batch, enc_seq)
    }
}

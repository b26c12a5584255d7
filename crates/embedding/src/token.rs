//! Token embedding lookup.

use candle_core::{bail, DType, Error, Result, Tensor};
use candle_nn::{Embedding, Module, VarBuilder};

/// Learnable token embedding table.
///
/// Inputs are `(batch, seq)` integer ids; outputs follow the
/// `(batch, seq, hidden)` layout. Ids outside `[0, vocab_size)` are rejected
/// before the lookup rather than wrapped or clamped.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    inner: Embedding,
    vocab_size: usize,
    hidden_dim: usize,
}

impl TokenEmbedding {
    pub fn new(vocab_size: usize, hidden_dim: usize, vb: VarBuilder) -> Result<Self> {
        if vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }
        let inner = candle_nn::embedding(vocab_size, hidden_dim, vb)?;
        Ok(Self {
            inner,
            vocab_size,
            hidden_dim,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Look up embeddings for the provided token ids.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        self.validate_token_ids(token_ids)?;
        self.ensure_id_range(token_ids)?;
        let ids = token_ids.to_dtype(DType::U32)?;
        self.inner.forward(&ids)
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<()> {
        match token_ids.dims() {
            [batch, seq] => {
                if *batch == 0 || *seq == 0 {
                    return Err(Error::Msg(
                        "token_ids must have non-zero batch and seq dimensions".into(),
                    ));
                }
            }
            dims => {
                return Err(Error::Msg(format!(
                    "token_ids must be shaped (batch, seq), got {dims:?}"
                )))
            }
        }
        if !token_ids.dtype().is_int() {
            return Err(Error::Msg(format!(
                "token_ids expected integer dtype but received {:?}",
                token_ids.dtype()
            )));
        }
        Ok(())
    }

    fn ensure_id_range(&self, token_ids: &Tensor) -> Result<()> {
        let flat = token_ids.flatten_all()?.to_dtype(DType::I64)?;
        let min_id = flat.min_all()?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(Error::Msg(format!(
                "token id {min_id} is negative; ids must be in [0, {})",
                self.vocab_size
            )));
        }
        let max_id = flat.max_all()?.to_scalar::<i64>()?;
        if max_id >= self.vocab_size as i64 {
            return Err(Error::Msg(format!(
                "token id {max_id} is out of range; ids must be in [0, {})",
                self.vocab_size
            )));
        }
        Ok(())
    }
}

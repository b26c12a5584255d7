//! Sinusoidal positional encoding.
//!
//! The table is computed once at construction from the closed-form
//! `PE[pos, i] = sin(pos / 10000^(2*(i/2)/d_model))` for even `i` and the
//! matching cosine for odd `i`, then sliced per forward call. There are no
//! learnable parameters; the only train-time behaviour is dropout on the
//! summed result.

use candle_core::{bail, Device, Error, Result, Tensor};
use candle_nn::Dropout;

/// Precomputed additive position signal shared by encoder and decoder stacks.
#[derive(Debug, Clone)]
pub struct SinusoidalEncoding {
    table: Tensor,
    dropout: Dropout,
    max_len: usize,
    d_model: usize,
}

impl SinusoidalEncoding {
    pub fn new(d_model: usize, max_len: usize, dropout_p: f32, device: &Device) -> Result<Self> {
        if d_model == 0 {
            bail!("positional encoding requires d_model > 0");
        }
        if max_len == 0 {
            bail!("positional encoding requires max_len > 0");
        }

        let mut data = vec![0f32; max_len * d_model];
        for pos in 0..max_len {
            for i in 0..d_model {
                let exponent = (2 * (i / 2)) as f32 / d_model as f32;
                let angle = pos as f32 / 10_000f32.powf(exponent);
                data[pos * d_model + i] = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            }
        }
        let table = Tensor::from_vec(data, (max_len, d_model), device)?;

        Ok(Self {
            table,
            dropout: Dropout::new(dropout_p),
            max_len,
            d_model,
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The full `(max_len, d_model)` table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }

    /// Add the position signal for the first `seq` positions onto `hidden`,
    /// shaped `(batch, seq, d_model)`, and apply dropout when training.
    pub fn forward(&self, hidden: &Tensor, train: bool) -> Result<Tensor> {
        let (_, seq, dim) = hidden.dims3().map_err(|_| {
            Error::Msg(format!(
                "positional encoding expects (batch, seq, d_model), got {:?}",
                hidden.dims()
            ))
        })?;
        if dim != self.d_model {
            return Err(Error::Msg(format!(
                "positional encoding built for d_model {} but input has {}",
                self.d_model, dim
            )));
        }
        if seq > self.max_len {
            return Err(Error::Msg(format!(
                "sequence length {} exceeds positional table capacity {}",
                seq, self.max_len
            )));
        }

        let slice = self.table.narrow(0, 0, seq)?.unsqueeze(0)?;
        let summed = hidden.broadcast_add(&slice)?;
        if train {
            self.dropout.forward(&summed, train)
        } else {
            Ok(summed)
        }
    }
}

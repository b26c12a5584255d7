//! Position-wise feed-forward sublayer.

use candle_core::{Result, Tensor};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};

/// Two linear layers with a GELU in between, expanding to four times the
/// model dimension and back. Applied independently at every sequence
/// position; dropout lands on the contracted output.
#[derive(Debug)]
pub struct FeedForward {
    expand: Linear,
    contract: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(hidden_dim: usize, dropout_p: f32, vb: VarBuilder) -> Result<Self> {
        let inner_dim = 4 * hidden_dim;
        let expand = linear(hidden_dim, inner_dim, vb.pp("expand"))?;
        let contract = linear(inner_dim, hidden_dim, vb.pp("contract"))?;
        Ok(Self {
            expand,
            contract,
            dropout: Dropout::new(dropout_p),
        })
    }

    pub fn forward(&self, hidden: &Tensor, train: bool) -> Result<Tensor> {
        let expanded = self.expand.forward(hidden)?;
        let activated = expanded.gelu_erf()?;
        let contracted = self.contract.forward(&activated)?;
        if train {
            self.dropout.forward(&contracted, train)
        } else {
            Ok(contracted)
        }
    }
}

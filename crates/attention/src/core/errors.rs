//! Error types emitted by attention kernels.

use thiserror::Error;

/// Attention-specific error category.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// The supplied tensors do not match the documented layout contract.
    #[error("invalid tensor shape for {context}")]
    InvalidShape { context: String },
    /// The kernel does not support the requested data type.
    #[error("unsupported dtype {requested}")]
    UnsupportedDType { requested: String },
    /// A configuration value is outside its valid range.
    #[error("invalid attention configuration: {message}")]
    Config { message: String },
    /// A backend failure propagated from the tensor engine.
    #[error("{message}")]
    Backend { message: String },
}

impl AttentionError {
    pub(crate) fn shape(context: impl Into<String>) -> Self {
        Self::InvalidShape {
            context: context.into(),
        }
    }
}

impl From<candle_core::Error> for AttentionError {
    fn from(err: candle_core::Error) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

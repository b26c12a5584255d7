//! Run-time configuration shared by attention kernels.

/// Knobs callers can tune without swapping kernel implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Probability for dropout applied to the attention weights.
    ///
    /// `None` disables dropout and makes the computation deterministic.
    /// Callers are expected to pass `None` outside of training.
    pub dropout_p: Option<f32>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { dropout_p: None }
    }
}

//! Workspace facade.
//!
//! Re-exports the attention, embedding, and model crates and provides the
//! device-selection helper shared by the demo binary and downstream users.

pub use attention;
pub use embedding;
pub use model;

use anyhow::Result;
use candle_core::Device;

/// Pick the compute device.
///
/// `SEQFORMER_FORCE_CPU` pins the CPU backend; otherwise CUDA is probed and
/// the CPU is the fallback.
pub fn setup_device() -> Result<Device> {
    if std::env::var("SEQFORMER_FORCE_CPU").is_ok() {
        log::info!("SEQFORMER_FORCE_CPU set, using CPU backend");
        return Ok(Device::Cpu);
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            log::info!("CUDA device selected: {device:?}");
            Ok(device)
        }
        Ok(_) | Err(_) => {
            log::info!("using CPU backend");
            Ok(Device::Cpu)
        }
    }
}

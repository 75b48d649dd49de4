use candle_core::Device;
use tracing::{info, warn};

use crate::error::CoreResult;

/// Pick the device both runners execute on.
///
/// GPU backends are only considered when compiled in (`cuda` / `metal`
/// features); any failure to open one falls back to the CPU.
pub fn select_device(prefer_gpu: bool) -> CoreResult<Device> {
    #[cfg(feature = "cuda")]
    if prefer_gpu {
        match Device::new_cuda(0) {
            Ok(dev) => {
                info!("Using CUDA device 0");
                return Ok(dev);
            }
            Err(e) => warn!(error = %e, "CUDA unavailable, falling back to CPU"),
        }
    }

    #[cfg(feature = "metal")]
    if prefer_gpu {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("Using Metal device");
                return Ok(dev);
            }
            Err(e) => warn!(error = %e, "Metal unavailable, falling back to CPU"),
        }
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    if prefer_gpu {
        warn!("--gpu has no effect: twinllm was built without the `cuda` or `metal` feature");
    }

    info!("Using CPU device");
    Ok(Device::Cpu)
}

pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA",
        Device::Metal(_) => "Metal",
    }
}

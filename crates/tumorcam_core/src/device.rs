//! Backend and compute device selection.
//!
//! The backend is chosen at compile time through cargo features:
//! `backend-wgpu` selects the GPU backend, otherwise `backend-ndarray`
//! runs everything on the CPU. Nothing is probed at runtime. Explanations
//! need gradients, so the pipeline backend is always the autodiff wrapper of
//! the inference backend.

use std::fmt;

use burn::prelude::*;
use burn_autodiff::Autodiff;

#[cfg(not(any(feature = "backend-ndarray", feature = "backend-wgpu")))]
compile_error!("tumorcam_core needs one of the `backend-ndarray` or `backend-wgpu` features");

/// Backend used for preprocessing, prediction and feature extraction.
#[cfg(feature = "backend-wgpu")]
pub type InferenceBackend = burn_wgpu::Wgpu;

/// Backend used for preprocessing, prediction and feature extraction.
#[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
pub type InferenceBackend = burn_ndarray::NdArray;

/// Autodiff backend used to back-propagate the target logit for Grad-CAM.
pub type ExplainBackend = Autodiff<InferenceBackend>;

/// Compute backend the pipeline was compiled for.
///
/// The choice between accelerator and CPU is made at compile time. Under
/// `backend-wgpu` the concrete adapter is picked by WGPU on first use. It
/// prefers high-power GPUs and may fall back to a CPU adapter;
/// `CUBECL_WGPU_DEFAULT_DEVICE` overrides the choice. This names the backend,
/// not the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeDevice {
    /// NdArray on the host CPU.
    Cpu,
    /// WGPU with its default adapter.
    Wgpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
            ComputeDevice::Wgpu => write!(f, "wgpu"),
        }
    }
}

/// Pick the device for the compiled backend: WGPU's default adapter when
/// the GPU backend is enabled, the CPU otherwise.
pub fn select_device() -> (ComputeDevice, <InferenceBackend as Backend>::Device) {
    #[cfg(feature = "backend-wgpu")]
    let selected = (ComputeDevice::Wgpu, burn_wgpu::WgpuDevice::DefaultDevice);

    #[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
    let selected = (ComputeDevice::Cpu, burn_ndarray::NdArrayDevice::Cpu);

    tracing::info!(backend = %selected.0, device = ?selected.1, "Using device");
    selected
}

/// Device of the compiled backend, without logging.
pub fn default_device() -> <InferenceBackend as Backend>::Device {
    <InferenceBackend as Backend>::Device::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_device_display() {
        assert_eq!(ComputeDevice::Cpu.to_string(), "cpu");
        assert_eq!(ComputeDevice::Wgpu.to_string(), "wgpu");
    }

    #[cfg(feature = "backend-wgpu")]
    #[test]
    fn test_select_device_wgpu() {
        let (kind, device) = select_device();
        assert_eq!(kind, ComputeDevice::Wgpu);
        assert_eq!(device, burn_wgpu::WgpuDevice::DefaultDevice);
    }

    #[cfg(all(feature = "backend-ndarray", not(feature = "backend-wgpu")))]
    #[test]
    fn test_select_device_cpu() {
        let (kind, device) = select_device();
        assert_eq!(kind, ComputeDevice::Cpu);
        assert_eq!(device, default_device());
    }
}

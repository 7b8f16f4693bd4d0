/*!
# Orbit GPU core - Vulkan backend

Vulkan implementation of the [`GpuDevice`](orbit_gpu_core::orbit::device::GpuDevice)
seam, using ash for the Vulkan bindings and gpu-allocator for memory.

Device bring-up is headless: the instance, a Vulkan 1.3 physical device with
descriptor indexing, a graphics queue and (when the hardware has one) a
dedicated transfer queue. SPIR-V reflection through spirq produces the
binding tables consumed by `ShaderEffect`.

Validation layer support is compiled in with the `vulkan-validation` feature.

# Example

```no_run
use orbit_gpu_core::orbit::CoreConfig;
use orbit_gpu_core_vulkan::orbit::VulkanGpuDevice;
use std::sync::Arc;

let config = CoreConfig::default();
let device = Arc::new(VulkanGpuDevice::from_core_config(&config)?);
# Ok::<(), orbit_gpu_core::orbit::Error>(())
```
*/

#[cfg(feature = "vulkan-validation")]
mod debug;
mod vulkan_config;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_gpu_device;
mod vulkan_reflection;

pub mod orbit {
    pub use crate::vulkan_config::{
        DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats, VulkanConfig,
    };
    pub use crate::vulkan_gpu_device::VulkanGpuDevice;
    pub use crate::vulkan_reflection::reflect_binding_table;

    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}

/*!
# Orbit GPU core

Resource lifetime and command submission core of the Orbit renderer.

This crate is backend-agnostic: every native call goes through the
[`GpuDevice`](orbit::device::GpuDevice) trait, implemented for Vulkan by
`orbit_gpu_core_vulkan` and in memory by
[`MockGpuDevice`](orbit::device::MockGpuDevice).

## Architecture

- **SlotPool / ResourcePool**: fixed-capacity arenas handing out generationless handles
- **ResourceManager**: buffers, textures and samplers with a frame-delayed deletion queue
- **CommandBufferManager**: per-frame, per-thread command pools plus immediate submit
- **ShaderEffectBinder**: name-based descriptor binding with per-set caching
- **BindlessTable**: append-only global sampled image array
- **FramePipeline**: N-deep ring of fences and semaphores driving the frame boundary
- **PipelineCache**: opaque pipeline cache blob persisted between runs

## Frame boundary

Each frame, on a single thread: wait on the slot's fence, reset the slot's
command pools and descriptor allocators, flush deletions that are at least
`frames_in_flight` frames old, then record.
*/

// Internal modules
mod command;
mod config;
mod descriptor;
mod error;
mod frame;
mod gpu_device;
mod pipeline_cache;
mod pool;
mod resource;
pub mod log;

// Main orbit namespace module
pub mod orbit {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::CoreConfig;

    // Pipeline cache persistence
    pub use crate::pipeline_cache::PipelineCache;

    // Logging sub-module (types and logger installation, macros live at the crate root)
    pub mod log {
        pub use crate::log::{reset_logger, set_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Native device seam and the mock device
    pub mod device {
        pub use crate::gpu_device::*;
    }

    // Slot pools and handles
    pub mod pool {
        pub use crate::pool::*;
    }

    // Resources and the resource manager
    pub mod resource {
        pub use crate::resource::*;
    }

    // Command buffers and immediate submit
    pub mod command {
        pub use crate::command::*;
    }

    // Binding tables, descriptor allocation, shader effects, bindless
    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    // Frame pipeline
    pub mod frame {
        pub use crate::frame::*;
    }
}

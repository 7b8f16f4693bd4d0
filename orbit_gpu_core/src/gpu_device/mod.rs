//! Native device seam, resource state tracking and the in-memory mock device

pub mod gpu_device;
pub mod mock_gpu_device;
pub mod resource_state;

pub use gpu_device::*;
pub use mock_gpu_device::{
    MockDeviceStats, MockGpuDevice, MockObjectKind, MockSubmission, MOCK_PIPELINE_CACHE_MAGIC,
};
pub use resource_state::{
    access_flags, barrier_for, image_layout, needs_barrier, pipeline_stages, AccessFlags,
    BarrierMasks, ImageLayout, PipelineStages, ResourceState,
};

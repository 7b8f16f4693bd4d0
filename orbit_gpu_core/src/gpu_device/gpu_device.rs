//! Native device seam
//!
//! Every native graphics call made by the core goes through [`GpuDevice`].
//! Native objects cross the seam as opaque 64-bit handles so the core never
//! depends on a specific graphics API.

use crate::error::Result;
use crate::gpu_device::resource_state::{AccessFlags, ImageLayout, PipelineStages};
use bitflags::bitflags;

// ============================================================================
// Raw native handles
// ============================================================================

macro_rules! define_raw_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// Null native handle
                pub const NULL: Self = Self(0);

                /// Returns true if this is the null handle
                pub fn is_null(&self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_raw_handle!(
    /// Native buffer object
    RawBuffer,
    /// Native image object
    RawImage,
    /// Native image view object
    RawImageView,
    /// Native sampler object
    RawSampler,
    /// Native command pool
    RawCommandPool,
    /// Native command buffer
    RawCommandBuffer,
    /// Native fence (GPU → CPU signal)
    RawFence,
    /// Native semaphore (GPU → GPU signal)
    RawSemaphore,
    /// Native descriptor pool
    RawDescriptorPool,
    /// Native descriptor set layout
    RawDescriptorSetLayout,
    /// Native descriptor set
    RawDescriptorSet,
    /// Native pipeline layout
    RawPipelineLayout,
    /// Native pipeline cache
    RawPipelineCache,
);

// ============================================================================
// Enums
// ============================================================================

/// Submission queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Transfer,
}

/// Memory placement hint for the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUsage {
    /// Device local, not host visible
    GpuOnly,
    /// Host visible, used for uploads and per-frame constants
    CpuToGpu,
    /// Host visible, used for readback
    GpuToCpu,
}

impl MemoryUsage {
    /// True if the CPU can write through a persistent mapping
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryUsage::GpuOnly)
    }
}

/// Command buffer level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// Command buffer begin flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferUsage {
    /// Recorded once, submitted once, then reset
    OneTimeSubmit,
    /// Secondary buffer executed inside a primary buffer's rendering scope
    RenderPassContinue,
}

/// Pipeline bind point for descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Descriptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    UniformBufferDynamic,
    StorageBuffer,
    StorageBufferDynamic,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    Sampler,
}

impl DescriptorType {
    /// True for descriptor types that reference a buffer
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer
                | DescriptorType::UniformBufferDynamic
                | DescriptorType::StorageBuffer
                | DescriptorType::StorageBufferDynamic
        )
    }

    /// True for descriptor types that consume a dynamic offset at bind time
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    Tex2D,
    Tex2DArray,
    Cube,
    Tex3D,
}

/// Texture format
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R8G8_UNORM | TextureFormat::D16_UNORM => 2,
            TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::R32_SFLOAT
            | TextureFormat::D32_SFLOAT
            | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    /// True for depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_SFLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }
}

/// Sampler filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampler mipmap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

/// Sampler address mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM      = 1 << 2;
        const STORAGE      = 1 << 3;
        const VERTEX       = 1 << 4;
        const INDEX        = 1 << 5;
        const INDIRECT     = 1 << 6;
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC     = 1 << 0;
        const TRANSFER_DST     = 1 << 1;
        const SAMPLED          = 1 << 2;
        const STORAGE          = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_ATTACHMENT = 1 << 5;
    }
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Native buffer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryUsage,
}

/// Native image description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, 1 otherwise
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: TextureFormat,
    pub texture_type: TextureType,
    pub usage: TextureUsage,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            texture_type: TextureType::Tex2D,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
        }
    }
}

/// Subresource range covered by an image view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureViewDesc {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl TextureViewDesc {
    /// View covering the whole image
    pub fn full(desc: &TextureDesc) -> Self {
        Self {
            base_mip: 0,
            mip_count: desc.mip_levels,
            base_layer: 0,
            layer_count: desc.array_layers,
        }
    }
}

/// Native sampler description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mipmap_mode: MipmapMode,
    pub address_mode: AddressMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Linear,
            address_mode: AddressMode::Repeat,
        }
    }
}

/// Native descriptor pool description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub max_sets: u32,
    /// Descriptor count reserved per type
    pub sizes: Vec<(DescriptorType, u32)>,
    /// Pool supports sets written after being bound (bindless)
    pub update_after_bind: bool,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size (1 for non-array bindings)
    pub count: u32,
    pub stages: ShaderStageFlags,
    /// Array entries may be left unwritten
    pub partially_bound: bool,
}

/// Buffer to buffer copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Buffer to image copy region (mip 0, all layers)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layer_count: u32,
}

/// Buffer memory barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: RawBuffer,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Image memory barrier with layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: RawImage,
    pub is_depth: bool,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
}

/// Attachment formats a secondary command buffer inherits from its primary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InheritanceInfo {
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
}

/// Queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [RawCommandBuffer],
    pub wait_semaphores: &'a [(RawSemaphore, PipelineStages)],
    pub signal_semaphores: &'a [RawSemaphore],
}

/// Resource referenced by a descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    Buffer {
        buffer: RawBuffer,
        offset: u64,
        range: u64,
    },
    Image {
        view: RawImageView,
        sampler: Option<RawSampler>,
        layout: ImageLayout,
    },
}

/// One descriptor write, flushed in batches through `update_descriptor_sets`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorUpdate {
    pub set: RawDescriptorSet,
    pub binding: u32,
    pub array_element: u32,
    pub descriptor_type: DescriptorType,
    pub resource: DescriptorResource,
}

// ============================================================================
// GpuDevice trait
// ============================================================================

/// Native graphics device
///
/// Implemented by backends (e.g., `VulkanGpuDevice`) and by `MockGpuDevice`
/// for tests. All methods take `&self`; implementations synchronize their own
/// internal state. Native failures return `Err` and are treated as fatal by
/// the frame driver.
pub trait GpuDevice: Send + Sync {
    // ===== QUEUES =====

    /// True if the device exposes a transfer queue separate from graphics
    fn has_dedicated_transfer_queue(&self) -> bool;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, name: &str) -> Result<RawBuffer>;
    fn destroy_buffer(&self, buffer: RawBuffer);

    /// Write bytes through the persistent mapping of a host-visible buffer
    fn write_buffer(&self, buffer: RawBuffer, offset: u64, data: &[u8]) -> Result<()>;

    // ===== IMAGES =====

    fn create_image(&self, desc: &TextureDesc, name: &str) -> Result<RawImage>;
    fn create_image_view(
        &self,
        image: RawImage,
        desc: &TextureDesc,
        view: &TextureViewDesc,
    ) -> Result<RawImageView>;
    fn destroy_image_view(&self, view: RawImageView);
    fn destroy_image(&self, image: RawImage);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<RawSampler>;
    fn destroy_sampler(&self, sampler: RawSampler);

    // ===== COMMAND POOLS / BUFFERS =====

    fn create_command_pool(&self, queue: QueueType, transient: bool) -> Result<RawCommandPool>;

    /// Reset a pool, returning every command buffer allocated from it to the initial state
    fn reset_command_pool(&self, pool: RawCommandPool) -> Result<()>;
    fn destroy_command_pool(&self, pool: RawCommandPool);

    fn allocate_command_buffers(
        &self,
        pool: RawCommandPool,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<RawCommandBuffer>>;
    fn begin_command_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        usage: CommandBufferUsage,
        inheritance: Option<&InheritanceInfo>,
    ) -> Result<()>;
    fn end_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()>;
    fn reset_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()>;

    // ===== RECORDING =====

    fn cmd_copy_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawBuffer,
        regions: &[BufferCopy],
    );
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawImage,
        is_depth: bool,
        region: &BufferImageCopy,
    );
    fn cmd_pipeline_barrier(
        &self,
        command_buffer: RawCommandBuffer,
        buffer_barriers: &[BufferBarrier],
        image_barriers: &[ImageBarrier],
    );
    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: RawCommandBuffer,
        bind_point: PipelineBindPoint,
        layout: RawPipelineLayout,
        first_set: u32,
        sets: &[RawDescriptorSet],
        dynamic_offsets: &[u32],
    );
    fn cmd_execute_commands(
        &self,
        command_buffer: RawCommandBuffer,
        secondaries: &[RawCommandBuffer],
    );

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawDescriptorPool>;
    fn reset_descriptor_pool(&self, pool: RawDescriptorPool) -> Result<()>;
    fn destroy_descriptor_pool(&self, pool: RawDescriptorPool);

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorSetLayoutBinding],
        update_after_bind: bool,
    ) -> Result<RawDescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: RawDescriptorSetLayout);

    /// Allocate one set from a pool
    ///
    /// Returns `Ok(None)` when the pool is out of memory or sets, so the
    /// caller can grow onto a fresh pool.
    fn allocate_descriptor_set(
        &self,
        pool: RawDescriptorPool,
        layout: RawDescriptorSetLayout,
    ) -> Result<Option<RawDescriptorSet>>;

    /// Apply a batch of descriptor writes in a single native call
    fn update_descriptor_sets(&self, updates: &[DescriptorUpdate]);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[RawDescriptorSetLayout],
        push_constant_size: u32,
    ) -> Result<RawPipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: RawPipelineLayout);

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<RawFence>;

    /// Wait for a fence; a failure to signal within the timeout is `DeviceLost`
    fn wait_for_fence(&self, fence: RawFence, timeout_ns: u64) -> Result<()>;
    fn reset_fence(&self, fence: RawFence) -> Result<()>;
    fn destroy_fence(&self, fence: RawFence);

    fn create_semaphore(&self) -> Result<RawSemaphore>;
    fn destroy_semaphore(&self, semaphore: RawSemaphore);

    fn submit(&self, queue: QueueType, info: &SubmitInfo, fence: Option<RawFence>) -> Result<()>;

    // ===== PIPELINE CACHE =====

    /// Create a pipeline cache, seeded with a previously saved blob
    ///
    /// Implementations reject blobs from another driver or device with `Err`.
    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<RawPipelineCache>;
    fn pipeline_cache_data(&self, cache: RawPipelineCache) -> Result<Vec<u8>>;
    fn destroy_pipeline_cache(&self, cache: RawPipelineCache);
}

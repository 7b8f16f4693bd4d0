//! `GpuDevice` implementation on top of ash and gpu-allocator

use crate::vulkan_config::VulkanConfig;
use crate::vulkan_context::VulkanContext;
use crate::vulkan_convert::*;
use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use orbit_gpu_core::orbit::device::*;
use orbit_gpu_core::orbit::{CoreConfig, Error, Result};
use orbit_gpu_core::{engine_err, engine_error, engine_info, engine_warn};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SOURCE: &str = "orbit::vulkan";

/// Size of the Vulkan pipeline cache header (version one)
const PIPELINE_CACHE_HEADER_SIZE: usize = 16 + vk::UUID_SIZE;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// True if a saved pipeline cache blob was produced by this driver and device
///
/// An empty blob is always accepted.
pub(crate) fn pipeline_cache_compatible(data: &[u8], properties: &vk::PhysicalDeviceProperties) -> bool {
    if data.is_empty() {
        return true;
    }
    if data.len() < PIPELINE_CACHE_HEADER_SIZE {
        return false;
    }

    let read_u32 = |offset: usize| {
        u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
    };

    read_u32(0) as usize >= PIPELINE_CACHE_HEADER_SIZE
        && read_u32(4) == vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32
        && read_u32(8) == properties.vendor_id
        && read_u32(12) == properties.device_id
        && data[16..PIPELINE_CACHE_HEADER_SIZE] == properties.pipeline_cache_uuid
}

struct BufferRecord {
    allocation: Allocation,
    size: u64,
}

/// Vulkan implementation of the native device seam
///
/// Every handle crossing the seam is the raw 64-bit Vulkan handle. Memory is
/// sub-allocated by gpu-allocator; the allocation of each buffer and image is
/// kept here until the object is destroyed.
pub struct VulkanGpuDevice {
    buffers: Mutex<FxHashMap<u64, BufferRecord>>,
    images: Mutex<FxHashMap<u64, Allocation>>,
    properties: vk::PhysicalDeviceProperties,
    context: VulkanContext,
}

impl VulkanGpuDevice {
    /// Bring up a headless device
    pub fn new(config: &VulkanConfig) -> Result<Self> {
        let context = VulkanContext::new(config)?;
        let properties = unsafe {
            context
                .instance
                .get_physical_device_properties(context.physical_device)
        };

        engine_info!(SOURCE, "VulkanGpuDevice initialized for '{}'", config.app_name);

        Ok(Self {
            buffers: Mutex::new(FxHashMap::default()),
            images: Mutex::new(FxHashMap::default()),
            properties,
            context,
        })
    }

    /// Bring up a device with validation and app name taken from the core configuration
    pub fn from_core_config(config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        Self::new(&VulkanConfig::from_core(config))
    }

    /// Logical device, for code that records pipelines and draws
    pub fn device(&self) -> &ash::Device {
        &self.context.device
    }

    pub fn physical_device_properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    fn queue_family(&self, queue: QueueType) -> Result<u32> {
        match (queue, self.context.families.transfer) {
            (QueueType::Graphics, _) => Ok(self.context.families.graphics),
            (QueueType::Transfer, Some(family)) => Ok(family),
            (QueueType::Transfer, None) => Err(engine_err!(
                SOURCE,
                "Transfer queue requested on a device without a dedicated transfer family"
            )),
        }
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        memory: MemoryUsage,
        linear: bool,
    ) -> Result<Allocation> {
        lock(&*self.context.allocator)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: memory_location(memory),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(
                    SOURCE,
                    "Out of GPU memory for '{}' (required: {:.2} MB): {:?}",
                    name,
                    size_mb,
                    e
                );
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Err(e) = lock(&*self.context.allocator).free(allocation) {
            engine_error!(SOURCE, "Failed to free GPU allocation: {:?}", e);
        }
    }
}

impl GpuDevice for VulkanGpuDevice {
    // ===== QUEUES =====

    fn has_dedicated_transfer_queue(&self) -> bool {
        self.context.transfer_queue.is_some()
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.context
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait idle: {:?}", e))
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, name: &str) -> Result<RawBuffer> {
        if desc.size == 0 {
            return Err(Error::InvalidResource(format!("buffer '{}' has zero size", name)));
        }

        let families = match self.context.families.transfer {
            Some(transfer) => vec![self.context.families.graphics, transfer],
            None => vec![self.context.families.graphics],
        };
        // Uploads run on the transfer queue, reads on graphics
        let sharing_mode = if families.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        unsafe {
            let device = &self.context.device;
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(sharing_mode)
                .queue_family_indices(&families);

            let buffer = device.create_buffer(&create_info, None).map_err(|e| {
                engine_err!(SOURCE, "Failed to create buffer '{}' of {} bytes: {:?}", name, desc.size, e)
            })?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate(name, requirements, desc.memory, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                device.destroy_buffer(buffer, None);
                self.free(allocation);
                return Err(engine_err!(SOURCE, "Failed to bind buffer memory: {:?}", e));
            }

            lock(&self.buffers).insert(
                buffer.as_raw(),
                BufferRecord {
                    allocation,
                    size: desc.size,
                },
            );
            Ok(RawBuffer(buffer.as_raw()))
        }
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        let record = lock(&self.buffers).remove(&buffer.0);
        unsafe {
            self.context
                .device
                .destroy_buffer(vk::Buffer::from_raw(buffer.0), None);
        }
        match record {
            Some(record) => self.free(record.allocation),
            None => engine_warn!(SOURCE, "destroy_buffer: unknown buffer {:#x}", buffer.0),
        }
    }

    fn write_buffer(&self, buffer: RawBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let mut buffers = lock(&self.buffers);
        let record = buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::InvalidResource(format!("unknown buffer {:#x}", buffer.0)))?;

        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= record.size)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "write of {} bytes at offset {} exceeds buffer size {}",
                    data.len(),
                    offset,
                    record.size
                ))
            })?;

        let mapped = record
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::InvalidResource("buffer is not host visible".to_string()))?;
        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &TextureDesc, name: &str) -> Result<RawImage> {
        let flags = if desc.texture_type == TextureType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        unsafe {
            let device = &self.context.device;
            let create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(image_type_to_vk(desc.texture_type))
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: desc.depth.max(1),
                })
                .mip_levels(desc.mip_levels)
                .array_layers(desc.array_layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = device.create_image(&create_info, None).map_err(|e| {
                engine_err!(
                    SOURCE,
                    "Failed to create image '{}' ({}x{} {:?}): {:?}",
                    name,
                    desc.width,
                    desc.height,
                    desc.format,
                    e
                )
            })?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = match self.allocate(name, requirements, MemoryUsage::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                device.destroy_image(image, None);
                self.free(allocation);
                return Err(engine_err!(SOURCE, "Failed to bind image memory: {:?}", e));
            }

            lock(&self.images).insert(image.as_raw(), allocation);
            Ok(RawImage(image.as_raw()))
        }
    }

    fn create_image_view(
        &self,
        image: RawImage,
        desc: &TextureDesc,
        view: &TextureViewDesc,
    ) -> Result<RawImageView> {
        // Sampled depth/stencil views read the depth aspect only
        let aspect = if desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk::Image::from_raw(image.0))
            .view_type(view_type_to_vk(desc.texture_type, view.layer_count))
            .format(format_to_vk(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: view.base_mip,
                level_count: view.mip_count,
                base_array_layer: view.base_layer,
                layer_count: view.layer_count,
            });

        unsafe {
            self.context
                .device
                .create_image_view(&create_info, None)
                .map(|view| RawImageView(view.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))
        }
    }

    fn destroy_image_view(&self, view: RawImageView) {
        unsafe {
            self.context
                .device
                .destroy_image_view(vk::ImageView::from_raw(view.0), None);
        }
    }

    fn destroy_image(&self, image: RawImage) {
        let allocation = lock(&self.images).remove(&image.0);
        unsafe {
            self.context
                .device
                .destroy_image(vk::Image::from_raw(image.0), None);
        }
        match allocation {
            Some(allocation) => self.free(allocation),
            None => engine_warn!(SOURCE, "destroy_image: unknown image {:#x}", image.0),
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<RawSampler> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode))
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);

        unsafe {
            self.context
                .device
                .create_sampler(&create_info, None)
                .map(|sampler| RawSampler(sampler.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create sampler: {:?}", e))
        }
    }

    fn destroy_sampler(&self, sampler: RawSampler) {
        unsafe {
            self.context
                .device
                .destroy_sampler(vk::Sampler::from_raw(sampler.0), None);
        }
    }

    // ===== COMMAND POOLS / BUFFERS =====

    fn create_command_pool(&self, queue: QueueType, transient: bool) -> Result<RawCommandPool> {
        let mut flags = vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        if transient {
            flags |= vk::CommandPoolCreateFlags::TRANSIENT;
        }

        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_family(queue)?)
            .flags(flags);

        unsafe {
            self.context
                .device
                .create_command_pool(&create_info, None)
                .map(|pool| RawCommandPool(pool.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create command pool: {:?}", e))
        }
    }

    fn reset_command_pool(&self, pool: RawCommandPool) -> Result<()> {
        unsafe {
            self.context
                .device
                .reset_command_pool(
                    vk::CommandPool::from_raw(pool.0),
                    vk::CommandPoolResetFlags::empty(),
                )
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command pool: {:?}", e))
        }
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        unsafe {
            self.context
                .device
                .destroy_command_pool(vk::CommandPool::from_raw(pool.0), None);
        }
    }

    fn allocate_command_buffers(
        &self,
        pool: RawCommandPool,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<RawCommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk::CommandPool::from_raw(pool.0))
            .level(command_buffer_level_to_vk(level))
            .command_buffer_count(count);

        unsafe {
            self.context
                .device
                .allocate_command_buffers(&allocate_info)
                .map(|buffers| {
                    buffers
                        .into_iter()
                        .map(|cb| RawCommandBuffer(cb.as_raw()))
                        .collect()
                })
                .map_err(|e| {
                    engine_err!(SOURCE, "Failed to allocate {} command buffers: {:?}", count, e)
                })
        }
    }

    fn begin_command_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        usage: CommandBufferUsage,
        inheritance: Option<&InheritanceInfo>,
    ) -> Result<()> {
        let flags = match usage {
            CommandBufferUsage::OneTimeSubmit => vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            CommandBufferUsage::RenderPassContinue => {
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
                    | vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE
            }
        };

        let color_formats: Vec<vk::Format> = inheritance
            .map(|info| info.color_formats.iter().map(|&f| format_to_vk(f)).collect())
            .unwrap_or_default();
        let depth_format = inheritance
            .and_then(|info| info.depth_format)
            .map(format_to_vk)
            .unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = match inheritance.and_then(|info| info.depth_format) {
            Some(TextureFormat::D24_UNORM_S8_UINT) => depth_format,
            _ => vk::Format::UNDEFINED,
        };

        let mut rendering_info = vk::CommandBufferInheritanceRenderingInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Ignored for primary command buffers
        let mut inheritance_info = vk::CommandBufferInheritanceInfo::default();
        if inheritance.is_some() {
            inheritance_info = inheritance_info.push_next(&mut rendering_info);
        }

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(flags)
            .inheritance_info(&inheritance_info);

        unsafe {
            self.context
                .device
                .begin_command_buffer(vk::CommandBuffer::from_raw(command_buffer.0), &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        unsafe {
            self.context
                .device
                .end_command_buffer(vk::CommandBuffer::from_raw(command_buffer.0))
                .map_err(|e| engine_err!(SOURCE, "Failed to end command buffer: {:?}", e))
        }
    }

    fn reset_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        unsafe {
            self.context
                .device
                .reset_command_buffer(
                    vk::CommandBuffer::from_raw(command_buffer.0),
                    vk::CommandBufferResetFlags::empty(),
                )
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))
        }
    }

    // ===== RECORDING =====

    fn cmd_copy_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawBuffer,
        regions: &[BufferCopy],
    ) {
        let regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|region| vk::BufferCopy {
                src_offset: region.src_offset,
                dst_offset: region.dst_offset,
                size: region.size,
            })
            .collect();

        unsafe {
            self.context.device.cmd_copy_buffer(
                vk::CommandBuffer::from_raw(command_buffer.0),
                vk::Buffer::from_raw(src.0),
                vk::Buffer::from_raw(dst.0),
                &regions,
            );
        }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawImage,
        is_depth: bool,
        region: &BufferImageCopy,
    ) {
        let aspect = if is_depth {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let copy = vk::BufferImageCopy::default()
            .buffer_offset(region.buffer_offset)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: region.layer_count,
            })
            .image_extent(vk::Extent3D {
                width: region.width,
                height: region.height,
                depth: region.depth.max(1),
            });

        unsafe {
            self.context.device.cmd_copy_buffer_to_image(
                vk::CommandBuffer::from_raw(command_buffer.0),
                vk::Buffer::from_raw(src.0),
                vk::Image::from_raw(dst.0),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&copy),
            );
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: RawCommandBuffer,
        buffer_barriers: &[BufferBarrier],
        image_barriers: &[ImageBarrier],
    ) {
        if buffer_barriers.is_empty() && image_barriers.is_empty() {
            return;
        }

        let mut src_stages = PipelineStages::empty();
        let mut dst_stages = PipelineStages::empty();

        let vk_buffer_barriers: Vec<vk::BufferMemoryBarrier> = buffer_barriers
            .iter()
            .map(|barrier| {
                src_stages |= barrier.src_stages;
                dst_stages |= barrier.dst_stages;
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(vk::Buffer::from_raw(barrier.buffer.0))
                    .offset(0)
                    .size(vk::WHOLE_SIZE)
            })
            .collect();

        let vk_image_barriers: Vec<vk::ImageMemoryBarrier> = image_barriers
            .iter()
            .map(|barrier| {
                src_stages |= barrier.src_stages;
                dst_stages |= barrier.dst_stages;
                let aspect = if barrier.is_depth {
                    vk::ImageAspectFlags::DEPTH
                } else {
                    vk::ImageAspectFlags::COLOR
                };
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .old_layout(image_layout_to_vk(barrier.old_layout))
                    .new_layout(image_layout_to_vk(barrier.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(vk::Image::from_raw(barrier.image.0))
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: aspect,
                        base_mip_level: 0,
                        level_count: vk::REMAINING_MIP_LEVELS,
                        base_array_layer: 0,
                        layer_count: vk::REMAINING_ARRAY_LAYERS,
                    })
            })
            .collect();

        unsafe {
            self.context.device.cmd_pipeline_barrier(
                vk::CommandBuffer::from_raw(command_buffer.0),
                pipeline_stages_to_vk(src_stages),
                pipeline_stages_to_vk(dst_stages),
                vk::DependencyFlags::empty(),
                &[],
                &vk_buffer_barriers,
                &vk_image_barriers,
            );
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: RawCommandBuffer,
        bind_point: PipelineBindPoint,
        layout: RawPipelineLayout,
        first_set: u32,
        sets: &[RawDescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        let sets: Vec<vk::DescriptorSet> =
            sets.iter().map(|set| vk::DescriptorSet::from_raw(set.0)).collect();

        unsafe {
            self.context.device.cmd_bind_descriptor_sets(
                vk::CommandBuffer::from_raw(command_buffer.0),
                bind_point_to_vk(bind_point),
                vk::PipelineLayout::from_raw(layout.0),
                first_set,
                &sets,
                dynamic_offsets,
            );
        }
    }

    fn cmd_execute_commands(&self, command_buffer: RawCommandBuffer, secondaries: &[RawCommandBuffer]) {
        if secondaries.is_empty() {
            return;
        }
        let secondaries: Vec<vk::CommandBuffer> = secondaries
            .iter()
            .map(|cb| vk::CommandBuffer::from_raw(cb.0))
            .collect();

        unsafe {
            self.context
                .device
                .cmd_execute_commands(vk::CommandBuffer::from_raw(command_buffer.0), &secondaries);
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawDescriptorPool> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
            .sizes
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|&(ty, count)| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(ty),
                descriptor_count: count,
            })
            .collect();

        let flags = if desc.update_after_bind {
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND
        } else {
            vk::DescriptorPoolCreateFlags::empty()
        };

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(desc.max_sets)
            .pool_sizes(&pool_sizes);

        unsafe {
            self.context
                .device
                .create_descriptor_pool(&create_info, None)
                .map(|pool| RawDescriptorPool(pool.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))
        }
    }

    fn reset_descriptor_pool(&self, pool: RawDescriptorPool) -> Result<()> {
        unsafe {
            self.context
                .device
                .reset_descriptor_pool(
                    vk::DescriptorPool::from_raw(pool.0),
                    vk::DescriptorPoolResetFlags::empty(),
                )
                .map_err(|e| engine_err!(SOURCE, "Failed to reset descriptor pool: {:?}", e))
        }
    }

    fn destroy_descriptor_pool(&self, pool: RawDescriptorPool) {
        unsafe {
            self.context
                .device
                .destroy_descriptor_pool(vk::DescriptorPool::from_raw(pool.0), None);
        }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorSetLayoutBinding],
        update_after_bind: bool,
    ) -> Result<RawDescriptorSetLayout> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stages_to_vk(binding.stages))
            })
            .collect();

        // Dynamic buffers cannot be updated after bind
        let binding_flags: Vec<vk::DescriptorBindingFlags> = bindings
            .iter()
            .map(|binding| {
                let mut flags = vk::DescriptorBindingFlags::empty();
                if binding.partially_bound {
                    flags |= vk::DescriptorBindingFlags::PARTIALLY_BOUND;
                }
                if update_after_bind && !binding.descriptor_type.is_dynamic() {
                    flags |= vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
                }
                flags
            })
            .collect();

        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let layout_flags = if update_after_bind {
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(layout_flags)
            .bindings(&vk_bindings)
            .push_next(&mut flags_info);

        unsafe {
            self.context
                .device
                .create_descriptor_set_layout(&create_info, None)
                .map(|layout| RawDescriptorSetLayout(layout.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e))
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: RawDescriptorSetLayout) {
        unsafe {
            self.context
                .device
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(layout.0), None);
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: RawDescriptorPool,
        layout: RawDescriptorSetLayout,
    ) -> Result<Option<RawDescriptorSet>> {
        let layout = vk::DescriptorSetLayout::from_raw(layout.0);
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk::DescriptorPool::from_raw(pool.0))
            .set_layouts(std::slice::from_ref(&layout));

        match unsafe { self.context.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok(sets.first().map(|set| RawDescriptorSet(set.as_raw()))),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                Ok(None)
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to allocate descriptor set: {:?}", e)),
        }
    }

    fn update_descriptor_sets(&self, updates: &[DescriptorUpdate]) {
        if updates.is_empty() {
            return;
        }

        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for update in updates {
            match update.resource {
                DescriptorResource::Buffer { buffer, offset, range } => {
                    buffer_infos.push(vk::DescriptorBufferInfo {
                        buffer: vk::Buffer::from_raw(buffer.0),
                        offset,
                        range,
                    });
                }
                DescriptorResource::Image { view, sampler, layout } => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: sampler
                            .map(|s| vk::Sampler::from_raw(s.0))
                            .unwrap_or_else(vk::Sampler::null),
                        image_view: vk::ImageView::from_raw(view.0),
                        image_layout: image_layout_to_vk(layout),
                    });
                }
            }
        }

        let (buffer_infos, image_infos) = (&buffer_infos, &image_infos);
        let mut next_buffer = 0;
        let mut next_image = 0;
        let writes: Vec<vk::WriteDescriptorSet> = updates
            .iter()
            .map(move |update| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(vk::DescriptorSet::from_raw(update.set.0))
                    .dst_binding(update.binding)
                    .dst_array_element(update.array_element)
                    .descriptor_type(descriptor_type_to_vk(update.descriptor_type));
                match update.resource {
                    DescriptorResource::Buffer { .. } => {
                        next_buffer += 1;
                        write.buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
                    }
                    DescriptorResource::Image { .. } => {
                        next_image += 1;
                        write.image_info(std::slice::from_ref(&image_infos[next_image - 1]))
                    }
                }
            })
            .collect();

        unsafe {
            self.context.device.update_descriptor_sets(&writes, &[]);
        }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[RawDescriptorSetLayout],
        push_constant_size: u32,
    ) -> Result<RawPipelineLayout> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = set_layouts
            .iter()
            .map(|layout| vk::DescriptorSetLayout::from_raw(layout.0))
            .collect();

        let push_constant_ranges = if push_constant_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::ALL,
                offset: 0,
                size: push_constant_size,
            }]
        } else {
            Vec::new()
        };

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        unsafe {
            self.context
                .device
                .create_pipeline_layout(&create_info, None)
                .map(|layout| RawPipelineLayout(layout.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))
        }
    }

    fn destroy_pipeline_layout(&self, layout: RawPipelineLayout) {
        unsafe {
            self.context
                .device
                .destroy_pipeline_layout(vk::PipelineLayout::from_raw(layout.0), None);
        }
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<RawFence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        unsafe {
            self.context
                .device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map(|fence| RawFence(fence.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create fence: {:?}", e))
        }
    }

    fn wait_for_fence(&self, fence: RawFence, timeout_ns: u64) -> Result<()> {
        let fence = vk::Fence::from_raw(fence.0);
        unsafe {
            self.context
                .device
                .wait_for_fences(std::slice::from_ref(&fence), true, timeout_ns)
                .map_err(|e| {
                    engine_error!(SOURCE, "Fence wait failed: {:?}", e);
                    Error::DeviceLost(format!("fence wait failed: {:?}", e))
                })
        }
    }

    fn reset_fence(&self, fence: RawFence) -> Result<()> {
        let fence = vk::Fence::from_raw(fence.0);
        unsafe {
            self.context
                .device
                .reset_fences(std::slice::from_ref(&fence))
                .map_err(|e| engine_err!(SOURCE, "Failed to reset fence: {:?}", e))
        }
    }

    fn destroy_fence(&self, fence: RawFence) {
        unsafe {
            self.context
                .device
                .destroy_fence(vk::Fence::from_raw(fence.0), None);
        }
    }

    fn create_semaphore(&self) -> Result<RawSemaphore> {
        unsafe {
            self.context
                .device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map(|semaphore| RawSemaphore(semaphore.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create semaphore: {:?}", e))
        }
    }

    fn destroy_semaphore(&self, semaphore: RawSemaphore) {
        unsafe {
            self.context
                .device
                .destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None);
        }
    }

    fn submit(&self, queue: QueueType, info: &SubmitInfo, fence: Option<RawFence>) -> Result<()> {
        let queue_mutex = match queue {
            QueueType::Graphics => &self.context.graphics_queue,
            QueueType::Transfer => self.context.transfer_queue.as_ref().ok_or_else(|| {
                engine_err!(SOURCE, "Submit to transfer queue on a device without one")
            })?,
        };

        let command_buffers: Vec<vk::CommandBuffer> = info
            .command_buffers
            .iter()
            .map(|cb| vk::CommandBuffer::from_raw(cb.0))
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> = info
            .wait_semaphores
            .iter()
            .map(|(semaphore, _)| vk::Semaphore::from_raw(semaphore.0))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = info
            .wait_semaphores
            .iter()
            .map(|&(_, stages)| pipeline_stages_to_vk(stages))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = info
            .signal_semaphores
            .iter()
            .map(|semaphore| vk::Semaphore::from_raw(semaphore.0))
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let fence = fence
            .map(|fence| vk::Fence::from_raw(fence.0))
            .unwrap_or_else(vk::Fence::null);

        let native_queue = lock(queue_mutex);
        unsafe {
            self.context
                .device
                .queue_submit(*native_queue, std::slice::from_ref(&submit_info), fence)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit to {:?} queue: {:?}", queue, e))
        }
    }

    // ===== PIPELINE CACHE =====

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<RawPipelineCache> {
        if !pipeline_cache_compatible(initial_data, &self.properties) {
            return Err(Error::InvalidResource(
                "pipeline cache blob was produced by another driver or device".to_string(),
            ));
        }

        let create_info = vk::PipelineCacheCreateInfo::default().initial_data(initial_data);

        unsafe {
            self.context
                .device
                .create_pipeline_cache(&create_info, None)
                .map(|cache| RawPipelineCache(cache.as_raw()))
                .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline cache: {:?}", e))
        }
    }

    fn pipeline_cache_data(&self, cache: RawPipelineCache) -> Result<Vec<u8>> {
        unsafe {
            self.context
                .device
                .get_pipeline_cache_data(vk::PipelineCache::from_raw(cache.0))
                .map_err(|e| engine_err!(SOURCE, "Failed to read pipeline cache data: {:?}", e))
        }
    }

    fn destroy_pipeline_cache(&self, cache: RawPipelineCache) {
        unsafe {
            self.context
                .device
                .destroy_pipeline_cache(vk::PipelineCache::from_raw(cache.0), None);
        }
    }
}

impl Drop for VulkanGpuDevice {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();
        }

        let buffers: Vec<(u64, BufferRecord)> = lock(&self.buffers).drain().collect();
        let images: Vec<(u64, Allocation)> = lock(&self.images).drain().collect();
        if !buffers.is_empty() || !images.is_empty() {
            engine_warn!(
                SOURCE,
                "Destroying device with {} buffer(s) and {} image(s) still alive",
                buffers.len(),
                images.len()
            );
        }

        for (raw, record) in buffers {
            unsafe {
                self.context
                    .device
                    .destroy_buffer(vk::Buffer::from_raw(raw), None);
            }
            self.free(record.allocation);
        }
        for (raw, allocation) in images {
            unsafe {
                self.context
                    .device
                    .destroy_image(vk::Image::from_raw(raw), None);
            }
            self.free(allocation);
        }

        engine_info!(SOURCE, "VulkanGpuDevice destroyed");
        // `context` drops next: allocator, messenger, device, instance
    }
}

#[cfg(test)]
#[path = "vulkan_gpu_device_tests.rs"]
mod tests;

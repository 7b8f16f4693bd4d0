//! Conversions from core device types to Vulkan types
//!
//! Pure mapping functions, testable without a GPU.

use ash::vk;
use gpu_allocator::MemoryLocation;
use orbit_gpu_core::orbit::device::{
    AccessFlags, AddressMode, BufferUsage, CommandBufferLevel, DescriptorType, Filter,
    ImageLayout, MemoryUsage, MipmapMode, PipelineBindPoint, PipelineStages, ShaderStageFlags,
    TextureFormat, TextureType, TextureUsage,
};

// ============================================================================
// Formats and images
// ============================================================================

pub(crate) fn format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8_UNORM => vk::Format::R8_UNORM,
        TextureFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub(crate) fn image_type_to_vk(texture_type: TextureType) -> vk::ImageType {
    match texture_type {
        TextureType::Tex2D | TextureType::Tex2DArray | TextureType::Cube => vk::ImageType::TYPE_2D,
        TextureType::Tex3D => vk::ImageType::TYPE_3D,
    }
}

/// View type of an image view
///
/// A 2D view of a single layer of an array texture is a plain 2D view.
pub(crate) fn view_type_to_vk(texture_type: TextureType, layer_count: u32) -> vk::ImageViewType {
    match texture_type {
        TextureType::Tex2D => vk::ImageViewType::TYPE_2D,
        TextureType::Tex2DArray if layer_count == 1 => vk::ImageViewType::TYPE_2D,
        TextureType::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Cube if layer_count == 6 => vk::ImageViewType::CUBE,
        TextureType::Cube if layer_count == 1 => vk::ImageViewType::TYPE_2D,
        TextureType::Cube => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Tex3D => vk::ImageViewType::TYPE_3D,
    }
}

/// Aspect mask for a format (depth/stencil formats cover their stencil too)
pub(crate) fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    match format {
        TextureFormat::D24_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        TextureFormat::D16_UNORM | TextureFormat::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub(crate) fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let table = [
        (TextureUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (TextureUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (TextureUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (TextureUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (TextureUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (TextureUsage::DEPTH_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
    ];

    table
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag)
}

// ============================================================================
// Buffers and memory
// ============================================================================

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let table = [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
    ];

    table
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag)
}

pub(crate) fn memory_location(memory: MemoryUsage) -> MemoryLocation {
    match memory {
        MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

// ============================================================================
// Samplers
// ============================================================================

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn mipmap_mode_to_vk(mode: MipmapMode) -> vk::SamplerMipmapMode {
    match mode {
        MipmapMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        MipmapMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

// ============================================================================
// Descriptors and pipelines
// ============================================================================

pub(crate) fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
    }
}

pub(crate) fn shader_stages_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub(crate) fn bind_point_to_vk(bind_point: PipelineBindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

pub(crate) fn command_buffer_level_to_vk(level: CommandBufferLevel) -> vk::CommandBufferLevel {
    match level {
        CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
        CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
    }
}

// ============================================================================
// Synchronization
// ============================================================================

/// Pipeline stage mask; an empty set maps to TOP_OF_PIPE
pub(crate) fn pipeline_stages_to_vk(stages: PipelineStages) -> vk::PipelineStageFlags {
    let table = [
        (PipelineStages::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (PipelineStages::DRAW_INDIRECT, vk::PipelineStageFlags::DRAW_INDIRECT),
        (PipelineStages::VERTEX_INPUT, vk::PipelineStageFlags::VERTEX_INPUT),
        (PipelineStages::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (PipelineStages::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (PipelineStages::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
        (PipelineStages::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags::LATE_FRAGMENT_TESTS),
        (PipelineStages::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStages::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (PipelineStages::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (PipelineStages::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        (PipelineStages::ALL_COMMANDS, vk::PipelineStageFlags::ALL_COMMANDS),
    ];

    let flags = table
        .iter()
        .filter(|(flag, _)| stages.contains(*flag))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag);

    if flags.is_empty() {
        vk::PipelineStageFlags::TOP_OF_PIPE
    } else {
        flags
    }
}

pub(crate) fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags {
    let table = [
        (AccessFlags::INDIRECT_COMMAND_READ, vk::AccessFlags::INDIRECT_COMMAND_READ),
        (AccessFlags::INDEX_READ, vk::AccessFlags::INDEX_READ),
        (AccessFlags::VERTEX_ATTRIBUTE_READ, vk::AccessFlags::VERTEX_ATTRIBUTE_READ),
        (AccessFlags::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
        (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        (
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        (
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (AccessFlags::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
        (AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
        (AccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
    ];

    table
        .iter()
        .filter(|(flag, _)| access.contains(*flag))
        .fold(vk::AccessFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag)
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

#[cfg(test)]
#[path = "vulkan_convert_tests.rs"]
mod tests;

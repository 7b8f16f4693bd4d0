//! Unit tests for the core → Vulkan conversion tables
//!
//! Pure mappings, no GPU required.

use super::*;

// ============================================================================
// FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_format_to_vk_color_formats() {
    assert_eq!(format_to_vk(TextureFormat::R8_UNORM), vk::Format::R8_UNORM);
    assert_eq!(format_to_vk(TextureFormat::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(format_to_vk(TextureFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(
        format_to_vk(TextureFormat::R16G16B16A16_SFLOAT),
        vk::Format::R16G16B16A16_SFLOAT
    );
}

#[test]
fn test_format_to_vk_depth_formats() {
    assert_eq!(format_to_vk(TextureFormat::D16_UNORM), vk::Format::D16_UNORM);
    assert_eq!(format_to_vk(TextureFormat::D32_SFLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(
        format_to_vk(TextureFormat::D24_UNORM_S8_UINT),
        vk::Format::D24_UNORM_S8_UINT
    );
}

#[test]
fn test_aspect_mask() {
    assert_eq!(aspect_mask(TextureFormat::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(TextureFormat::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(TextureFormat::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// IMAGE / VIEW TYPE TESTS
// ============================================================================

#[test]
fn test_image_type_to_vk() {
    assert_eq!(image_type_to_vk(TextureType::Tex2D), vk::ImageType::TYPE_2D);
    assert_eq!(image_type_to_vk(TextureType::Tex2DArray), vk::ImageType::TYPE_2D);
    assert_eq!(image_type_to_vk(TextureType::Cube), vk::ImageType::TYPE_2D);
    assert_eq!(image_type_to_vk(TextureType::Tex3D), vk::ImageType::TYPE_3D);
}

#[test]
fn test_view_type_to_vk_array_and_cube() {
    assert_eq!(view_type_to_vk(TextureType::Tex2DArray, 4), vk::ImageViewType::TYPE_2D_ARRAY);
    assert_eq!(view_type_to_vk(TextureType::Cube, 6), vk::ImageViewType::CUBE);
}

#[test]
fn test_view_type_to_vk_single_layer_alias() {
    assert_eq!(view_type_to_vk(TextureType::Tex2DArray, 1), vk::ImageViewType::TYPE_2D);
    assert_eq!(view_type_to_vk(TextureType::Cube, 1), vk::ImageViewType::TYPE_2D);
}

// ============================================================================
// USAGE FLAG TESTS
// ============================================================================

#[test]
fn test_buffer_usage_to_vk() {
    assert_eq!(buffer_usage_to_vk(BufferUsage::empty()), vk::BufferUsageFlags::empty());
    assert_eq!(
        buffer_usage_to_vk(BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST),
        vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
    );
    assert_eq!(
        buffer_usage_to_vk(BufferUsage::VERTEX | BufferUsage::INDEX | BufferUsage::INDIRECT),
        vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::INDEX_BUFFER
            | vk::BufferUsageFlags::INDIRECT_BUFFER
    );
}

#[test]
fn test_texture_usage_to_vk() {
    assert_eq!(
        texture_usage_to_vk(TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST),
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST
    );
    assert_eq!(
        texture_usage_to_vk(TextureUsage::DEPTH_ATTACHMENT),
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
    );
}

#[test]
fn test_memory_location() {
    assert_eq!(memory_location(MemoryUsage::GpuOnly), MemoryLocation::GpuOnly);
    assert_eq!(memory_location(MemoryUsage::CpuToGpu), MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(MemoryUsage::GpuToCpu), MemoryLocation::GpuToCpu);
}

// ============================================================================
// SAMPLER TESTS
// ============================================================================

#[test]
fn test_sampler_modes_to_vk() {
    assert_eq!(filter_to_vk(Filter::Nearest), vk::Filter::NEAREST);
    assert_eq!(mipmap_mode_to_vk(MipmapMode::Linear), vk::SamplerMipmapMode::LINEAR);
    assert_eq!(
        address_mode_to_vk(AddressMode::MirroredRepeat),
        vk::SamplerAddressMode::MIRRORED_REPEAT
    );
    assert_eq!(
        address_mode_to_vk(AddressMode::ClampToBorder),
        vk::SamplerAddressMode::CLAMP_TO_BORDER
    );
}

// ============================================================================
// DESCRIPTOR / STAGE TESTS
// ============================================================================

#[test]
fn test_descriptor_type_to_vk_dynamic_variants() {
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::UniformBufferDynamic),
        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
    );
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::StorageBufferDynamic),
        vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
    );
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
}

#[test]
fn test_shader_stages_to_vk() {
    assert_eq!(
        shader_stages_to_vk(ShaderStageFlags::ALL_GRAPHICS),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(
        shader_stages_to_vk(ShaderStageFlags::COMPUTE),
        vk::ShaderStageFlags::COMPUTE
    );
}

#[test]
fn test_bind_point_and_level_to_vk() {
    assert_eq!(bind_point_to_vk(PipelineBindPoint::Compute), vk::PipelineBindPoint::COMPUTE);
    assert_eq!(
        command_buffer_level_to_vk(CommandBufferLevel::Secondary),
        vk::CommandBufferLevel::SECONDARY
    );
}

// ============================================================================
// SYNCHRONIZATION TESTS
// ============================================================================

#[test]
fn test_pipeline_stages_to_vk_empty_is_top_of_pipe() {
    assert_eq!(
        pipeline_stages_to_vk(PipelineStages::empty()),
        vk::PipelineStageFlags::TOP_OF_PIPE
    );
}

#[test]
fn test_pipeline_stages_to_vk_combined() {
    assert_eq!(
        pipeline_stages_to_vk(PipelineStages::TRANSFER | PipelineStages::FRAGMENT_SHADER),
        vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::FRAGMENT_SHADER
    );
}

#[test]
fn test_access_flags_to_vk() {
    assert_eq!(access_flags_to_vk(AccessFlags::empty()), vk::AccessFlags::empty());
    assert_eq!(
        access_flags_to_vk(AccessFlags::TRANSFER_WRITE | AccessFlags::SHADER_READ),
        vk::AccessFlags::TRANSFER_WRITE | vk::AccessFlags::SHADER_READ
    );
}

#[test]
fn test_image_layout_to_vk() {
    assert_eq!(image_layout_to_vk(ImageLayout::Undefined), vk::ImageLayout::UNDEFINED);
    assert_eq!(
        image_layout_to_vk(ImageLayout::ShaderReadOnly),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
    assert_eq!(image_layout_to_vk(ImageLayout::PresentSrc), vk::ImageLayout::PRESENT_SRC_KHR);
}

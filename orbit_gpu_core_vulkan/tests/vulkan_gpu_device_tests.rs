//! Tests against a real Vulkan device
//!
//! Ignored by default: run with `--ignored` on a machine with a Vulkan 1.3 GPU.

use orbit_gpu_core::orbit::command::CommandBufferManager;
use orbit_gpu_core::orbit::descriptor::DescriptorAllocatorGrid;
use orbit_gpu_core::orbit::device::{
    BufferUsage, GpuDevice, MemoryUsage, SamplerDesc, TextureDesc, TextureFormat, TextureUsage,
};
use orbit_gpu_core::orbit::frame::FramePipeline;
use orbit_gpu_core::orbit::resource::{
    BufferCreation, ResourceManager, SamplerCreation, TextureCreation,
};
use orbit_gpu_core::orbit::CoreConfig;
use orbit_gpu_core_vulkan::orbit::{VulkanConfig, VulkanGpuDevice};
use std::sync::Arc;

fn create_device() -> Arc<VulkanGpuDevice> {
    let config = VulkanConfig {
        enable_validation: false,
        ..VulkanConfig::default()
    };
    Arc::new(VulkanGpuDevice::new(&config).expect("Vulkan device"))
}

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_device_creation_and_wait_idle() {
    let device = create_device();

    assert!(device.wait_idle().is_ok());
}

#[test]
#[ignore] // Requires GPU
fn test_fence_round_trip() {
    let device = create_device();

    let fence = device.create_fence(true).unwrap();
    device.wait_for_fence(fence, 1_000_000_000).unwrap();
    device.reset_fence(fence).unwrap();
    device.destroy_fence(fence);
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_resources_upload_and_flush() {
    let device = create_device();
    let config = CoreConfig::default();
    let commands =
        CommandBufferManager::new(device.clone(), config.frames_in_flight, config.num_threads)
            .unwrap();
    let mut resources =
        ResourceManager::new(device.clone(), commands.immediate().clone(), &config).unwrap();

    let buffer = resources
        .create_buffer(
            BufferCreation::new("vertices", 256, BufferUsage::VERTEX, MemoryUsage::GpuOnly)
                .with_data(vec![0u8; 256]),
        )
        .unwrap();

    let texture = resources
        .create_texture(
            TextureCreation::new(
                "checker",
                TextureDesc {
                    width: 4,
                    height: 4,
                    format: TextureFormat::R8G8B8A8_UNORM,
                    usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
                    ..TextureDesc::default()
                },
            )
            .with_data(vec![255u8; 4 * 4 * 4]),
        )
        .unwrap();
    let sampler = resources
        .create_sampler(SamplerCreation::new("linear", SamplerDesc::default()))
        .unwrap();

    resources.destroy_buffer(buffer);
    resources.destroy_texture(texture);
    resources.destroy_sampler(sampler);

    assert_eq!(resources.shutdown().unwrap(), 0);
    assert_eq!(resources.stats().pending_deletions, 0);
}

// ============================================================================
// FRAMES
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_frames_without_presentation() {
    let device = create_device();
    let config = CoreConfig::default();
    let commands =
        CommandBufferManager::new(device.clone(), config.frames_in_flight, config.num_threads)
            .unwrap();
    let descriptors = DescriptorAllocatorGrid::new(
        device.clone(),
        config.frames_in_flight,
        config.num_threads,
        config.descriptor_pool_max_sets,
    );
    let mut resources =
        ResourceManager::new(device.clone(), commands.immediate().clone(), &config).unwrap();
    let mut frames = FramePipeline::new(device.clone(), config.frames_in_flight).unwrap();

    for _ in 0..5 {
        let frame = frames.begin_frame(&commands, &descriptors, &mut resources).unwrap();
        let mut cmd = commands.get_command_buffer(frame.frame_slot, 0, true).unwrap();
        cmd.end().unwrap();
        frames.end_frame(&[cmd], false).unwrap();
    }

    assert_eq!(frames.frame_number(), 5);
    resources.shutdown().unwrap();
}

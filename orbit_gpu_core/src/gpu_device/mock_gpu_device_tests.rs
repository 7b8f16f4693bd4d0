//! Unit tests for MockGpuDevice
//!
//! The mock is the substrate for every core test, so its bookkeeping is
//! verified on its own first.

use crate::error::Error;
use crate::gpu_device::mock_gpu_device::{MockGpuDevice, MockObjectKind, MOCK_PIPELINE_CACHE_MAGIC};
use crate::gpu_device::*;

fn host_buffer_desc(size: u64) -> BufferDesc {
    BufferDesc {
        size,
        usage: BufferUsage::UNIFORM,
        memory: MemoryUsage::CpuToGpu,
    }
}

// ============================================================================
// OBJECT TRACKING
// ============================================================================

#[test]
fn test_create_destroy_buffer() {
    let device = MockGpuDevice::new();
    let buffer = device.create_buffer(&host_buffer_desc(64), "test").unwrap();

    assert!(!buffer.is_null());
    assert!(device.is_alive(buffer.0));
    assert_eq!(device.live_count(MockObjectKind::Buffer), 1);

    device.destroy_buffer(buffer);
    assert!(!device.is_alive(buffer.0));
    assert_eq!(device.stats().buffers_destroyed, 1);
}

#[test]
#[should_panic(expected = "destroyed twice")]
fn test_double_destroy_panics() {
    let device = MockGpuDevice::new();
    let sampler = device.create_sampler(&SamplerDesc::default()).unwrap();
    device.destroy_sampler(sampler);
    device.destroy_sampler(sampler);
}

#[test]
fn test_fail_next_allocation() {
    let device = MockGpuDevice::new();
    device.fail_next_allocation();
    assert!(matches!(
        device.create_buffer(&host_buffer_desc(16), "oom"),
        Err(Error::OutOfMemory)
    ));
    assert!(device.create_buffer(&host_buffer_desc(16), "ok").is_ok());
}

// ============================================================================
// BUFFER WRITES
// ============================================================================

#[test]
fn test_write_buffer() {
    let device = MockGpuDevice::new();
    let buffer = device.create_buffer(&host_buffer_desc(8), "test").unwrap();
    device.write_buffer(buffer, 2, &[1, 2, 3]).unwrap();
    assert_eq!(device.buffer_contents(buffer).unwrap(), vec![0, 0, 1, 2, 3, 0, 0, 0]);
}

#[test]
fn test_write_buffer_out_of_range() {
    let device = MockGpuDevice::new();
    let buffer = device.create_buffer(&host_buffer_desc(4), "test").unwrap();
    assert!(matches!(
        device.write_buffer(buffer, 2, &[0; 4]),
        Err(Error::InvalidResource(_))
    ));
    assert!(matches!(
        device.write_buffer(buffer, u64::MAX, &[1, 2, 3]),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_write_device_local_buffer_rejected() {
    let device = MockGpuDevice::new();
    let desc = BufferDesc {
        size: 16,
        usage: BufferUsage::VERTEX,
        memory: MemoryUsage::GpuOnly,
    };
    let buffer = device.create_buffer(&desc, "gpu").unwrap();
    assert!(device.write_buffer(buffer, 0, &[1]).is_err());
}

// ============================================================================
// COMMAND BUFFERS / SUBMISSION
// ============================================================================

#[test]
fn test_command_recording_and_submit() {
    let device = MockGpuDevice::new();
    let pool = device.create_command_pool(QueueType::Graphics, false).unwrap();
    let cb = device
        .allocate_command_buffers(pool, CommandBufferLevel::Primary, 1)
        .unwrap()[0];
    let fence = device.create_fence(false).unwrap();

    device
        .begin_command_buffer(cb, CommandBufferUsage::OneTimeSubmit, None)
        .unwrap();
    device.cmd_execute_commands(cb, &[]);
    device.end_command_buffer(cb).unwrap();

    let info = SubmitInfo {
        command_buffers: &[cb],
        wait_semaphores: &[],
        signal_semaphores: &[],
    };
    device.submit(QueueType::Graphics, &info, Some(fence)).unwrap();

    assert_eq!(
        device.commands(cb),
        vec!["begin(OneTimeSubmit)", "execute_commands(0)", "end"]
    );
    assert!(device.is_fence_signaled(fence));
    assert_eq!(device.submissions().len(), 1);
}

#[test]
fn test_submit_while_recording_fails() {
    let device = MockGpuDevice::new();
    let pool = device.create_command_pool(QueueType::Graphics, false).unwrap();
    let cb = device
        .allocate_command_buffers(pool, CommandBufferLevel::Primary, 1)
        .unwrap()[0];
    device
        .begin_command_buffer(cb, CommandBufferUsage::OneTimeSubmit, None)
        .unwrap();

    let info = SubmitInfo {
        command_buffers: &[cb],
        wait_semaphores: &[],
        signal_semaphores: &[],
    };
    assert!(device.submit(QueueType::Graphics, &info, None).is_err());
}

#[test]
fn test_transfer_submit_requires_dedicated_queue() {
    let info = SubmitInfo {
        command_buffers: &[],
        wait_semaphores: &[],
        signal_semaphores: &[],
    };
    assert!(MockGpuDevice::new().submit(QueueType::Transfer, &info, None).is_err());
    assert!(MockGpuDevice::with_dedicated_transfer_queue()
        .submit(QueueType::Transfer, &info, None)
        .is_ok());
}

#[test]
fn test_unsignaled_fence_is_device_lost() {
    let device = MockGpuDevice::new();
    let fence = device.create_fence(false).unwrap();
    assert!(matches!(
        device.wait_for_fence(fence, u64::MAX),
        Err(Error::DeviceLost(_))
    ));

    let signaled = device.create_fence(true).unwrap();
    assert!(device.wait_for_fence(signaled, u64::MAX).is_ok());
    device.reset_fence(signaled).unwrap();
    assert!(!device.is_fence_signaled(signaled));
}

#[test]
fn test_reset_command_pool_clears_commands() {
    let device = MockGpuDevice::new();
    let pool = device.create_command_pool(QueueType::Graphics, false).unwrap();
    let cb = device
        .allocate_command_buffers(pool, CommandBufferLevel::Secondary, 1)
        .unwrap()[0];
    device
        .begin_command_buffer(cb, CommandBufferUsage::RenderPassContinue, None)
        .unwrap();
    device.reset_command_pool(pool).unwrap();

    assert!(device.commands(cb).is_empty());
    assert_eq!(device.command_buffer_level(cb), Some(CommandBufferLevel::Secondary));
    assert_eq!(device.stats().command_pool_resets, 1);
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[test]
fn test_descriptor_pool_exhaustion_returns_none() {
    let device = MockGpuDevice::new();
    let pool = device
        .create_descriptor_pool(&DescriptorPoolDesc {
            max_sets: 2,
            sizes: vec![(DescriptorType::UniformBuffer, 2)],
            update_after_bind: false,
        })
        .unwrap();
    let layout = device.create_descriptor_set_layout(&[], false).unwrap();

    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_some());
    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_some());
    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_none());

    device.reset_descriptor_pool(pool).unwrap();
    assert!(device.allocate_descriptor_set(pool, layout).unwrap().is_some());
    assert_eq!(device.stats().descriptor_sets_allocated, 3);
}

#[test]
fn test_update_descriptor_sets_records_binding() {
    let device = MockGpuDevice::new();
    let pool = device
        .create_descriptor_pool(&DescriptorPoolDesc {
            max_sets: 1,
            sizes: vec![],
            update_after_bind: false,
        })
        .unwrap();
    let layout = device.create_descriptor_set_layout(&[], false).unwrap();
    let set = device.allocate_descriptor_set(pool, layout).unwrap().unwrap();

    let resource = DescriptorResource::Buffer {
        buffer: RawBuffer(42),
        offset: 0,
        range: 256,
    };
    device.update_descriptor_sets(&[DescriptorUpdate {
        set,
        binding: 1,
        array_element: 0,
        descriptor_type: DescriptorType::UniformBuffer,
        resource,
    }]);

    assert_eq!(device.descriptor_binding(set, 1, 0), Some(resource));
    assert_eq!(device.stats().descriptor_update_calls, 1);
}

// ============================================================================
// PIPELINE CACHE
// ============================================================================

#[test]
fn test_pipeline_cache_blob() {
    let device = MockGpuDevice::new();
    let cache = device.create_pipeline_cache(&[]).unwrap();
    let data = device.pipeline_cache_data(cache).unwrap();
    assert!(data.starts_with(MOCK_PIPELINE_CACHE_MAGIC));

    assert!(device.create_pipeline_cache(b"garbage").is_err());
    assert!(device.create_pipeline_cache(&data).is_ok());
}

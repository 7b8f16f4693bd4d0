//! Integration tests for pool capacity and per-frame budgets
//!
//! No GPU required.
//!
//! Run with: cargo test --test resource_integration_tests

use orbit_gpu_core::orbit::command::{CommandBufferManager, MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD};
use orbit_gpu_core::orbit::device::{BufferUsage, MemoryUsage, MockGpuDevice, MockObjectKind};
use orbit_gpu_core::orbit::pool::BufferHandle;
use orbit_gpu_core::orbit::resource::{BufferCreation, ResourceManager};
use orbit_gpu_core::orbit::{CoreConfig, Error};
use std::sync::Arc;

fn manager(device: &Arc<MockGpuDevice>, config: &CoreConfig) -> ResourceManager {
    let commands = CommandBufferManager::new(device.clone(), config.frames_in_flight, 1).unwrap();
    ResourceManager::new(device.clone(), commands.immediate().clone(), config).unwrap()
}

// ============================================================================
// CAPACITY
// ============================================================================

#[test]
fn test_integration_default_buffer_pool_holds_16384() {
    let device = Arc::new(MockGpuDevice::new());
    let config = CoreConfig::default();
    assert_eq!(config.max_buffers, 16384);
    let mut resources = manager(&device, &config);

    let handles: Vec<BufferHandle> = (0..16384)
        .map(|i| {
            resources
                .create_buffer(BufferCreation::new(
                    format!("buffer_{}", i),
                    16,
                    BufferUsage::STORAGE,
                    MemoryUsage::CpuToGpu,
                ))
                .unwrap()
        })
        .collect();
    assert_eq!(resources.stats().buffers, 16384);

    let overflow = resources.create_buffer(BufferCreation::new(
        "buffer_16384",
        16,
        BufferUsage::STORAGE,
        MemoryUsage::CpuToGpu,
    ));
    match overflow {
        Err(Error::OutOfSlots { pool, capacity }) => {
            assert_eq!(pool, "buffers");
            assert_eq!(capacity, 16384);
        }
        other => panic!("expected OutOfSlots, got {:?}", other),
    }
    // The failed request did not leak a native buffer
    assert_eq!(device.live_count(MockObjectKind::Buffer), 16384);

    for handle in handles {
        resources.destroy_buffer(handle);
    }
    assert_eq!(resources.shutdown().unwrap(), 0);
    assert_eq!(device.live_count(MockObjectKind::Buffer), 0);
}

#[test]
fn test_integration_slot_reused_after_flush() {
    let device = Arc::new(MockGpuDevice::new());
    let config = CoreConfig {
        max_buffers: 1,
        ..CoreConfig::default()
    };
    let mut resources = manager(&device, &config);
    let create = |resources: &mut ResourceManager| {
        resources.create_buffer(BufferCreation::new("only", 16, BufferUsage::UNIFORM, MemoryUsage::CpuToGpu))
    };

    let first = create(&mut resources).unwrap();
    resources.destroy_buffer(first);
    // Still pending: the slot stays occupied
    assert!(matches!(create(&mut resources), Err(Error::OutOfSlots { .. })));

    resources.set_current_frame(config.frames_in_flight as u64);
    assert_eq!(resources.process_pending_deletions(), 1);
    let second = create(&mut resources).unwrap();
    assert_eq!(second, first);
}

// ============================================================================
// COMMAND BUFFER BUDGET
// ============================================================================

#[test]
fn test_integration_primary_budget_exactly_max() {
    let device = Arc::new(MockGpuDevice::new());
    let commands = CommandBufferManager::new(device.clone(), 2, 1).unwrap();
    commands.reset_pools(0).unwrap();

    for _ in 0..MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD {
        commands.get_command_buffer(0, 0, false).unwrap();
    }
    let overflow = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        commands.get_command_buffer(0, 0, false)
    }));
    assert!(overflow.is_err());

    // The next frame on the same slot starts from zero again
    commands.reset_pools(0).unwrap();
    assert!(commands.get_command_buffer(0, 0, true).is_ok());
}

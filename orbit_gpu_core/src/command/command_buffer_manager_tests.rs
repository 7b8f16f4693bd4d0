use super::*;
use crate::command::command_buffer::RecordingState;
use crate::gpu_device::{MockGpuDevice, MockObjectKind, TextureFormat};

fn create_manager(frames: u32, threads: u32) -> (Arc<MockGpuDevice>, CommandBufferManager) {
    let device = Arc::new(MockGpuDevice::new());
    let manager =
        CommandBufferManager::new(Arc::clone(&device) as Arc<dyn GpuDevice>, frames, threads).unwrap();
    (device, manager)
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
fn test_pool_grid_allocation() {
    let (device, manager) = create_manager(2, 3);

    // 2 x 3 grid plus one immediate-submit pool
    assert_eq!(device.live_count(MockObjectKind::CommandPool), 7);
    assert_eq!(
        device.stats().command_buffers_allocated,
        6 * (MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD + MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD) + 1
    );
    assert_eq!(manager.frames_in_flight(), 2);
    assert_eq!(manager.num_threads(), 3);
}

#[test]
fn test_drop_destroys_pools() {
    let (device, manager) = create_manager(2, 2);
    drop(manager);
    assert_eq!(device.live_count(MockObjectKind::CommandPool), 0);
    assert_eq!(device.live_count(MockObjectKind::Fence), 0);
}

// ============================================================================
// PRIMARY BUFFERS
// ============================================================================

#[test]
fn test_get_command_buffer_begins() {
    let (device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    let cmd = manager.get_command_buffer(0, 0, true).unwrap();
    assert_eq!(cmd.state(), RecordingState::Recording);
    assert_eq!(cmd.level(), CommandBufferLevel::Primary);
    assert_eq!(device.commands(cmd.raw()), vec!["begin(OneTimeSubmit)"]);
}

#[test]
fn test_get_command_buffer_without_begin() {
    let (_device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    let cmd = manager.get_command_buffer(0, 0, false).unwrap();
    assert_eq!(cmd.state(), RecordingState::Initial);
}

#[test]
fn test_distinct_buffers_per_request() {
    let (_device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    let a = manager.get_command_buffer(0, 0, false).unwrap();
    let b = manager.get_command_buffer(0, 0, false).unwrap();
    let other_slot = manager.get_command_buffer(1, 0, false).unwrap();
    assert_ne!(a.raw(), b.raw());
    assert_ne!(a.raw(), other_slot.raw());
}

#[test]
fn test_budget_allows_exactly_max() {
    let (_device, manager) = create_manager(2, 1);
    manager.reset_pools(1).unwrap();

    for _ in 0..MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD {
        manager.get_command_buffer(1, 0, true).unwrap();
    }
    assert_eq!(manager.stats(1).primary_in_use, MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD);
}

#[test]
#[should_panic(expected = "budget exhausted")]
fn test_budget_overrun_panics() {
    let (_device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    for _ in 0..=MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD {
        let _ = manager.get_command_buffer(0, 0, true);
    }
}

#[test]
fn test_reset_pools_rewinds_cursor() {
    let (device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    let first = manager.get_command_buffer(0, 0, true).unwrap().raw();
    manager.get_command_buffer(0, 0, true).unwrap();

    manager.reset_pools(0).unwrap();
    assert_eq!(manager.stats(0).primary_in_use, 0);
    assert_eq!(manager.stats(0).resets, 2);
    // Reset pool invalidates recorded content
    assert!(device.commands(first).is_empty());

    let again = manager.get_command_buffer(0, 0, true).unwrap().raw();
    assert_eq!(first, again);
}

#[test]
fn test_reset_only_touches_requested_slot() {
    let (_device, manager) = create_manager(2, 2);
    manager.reset_pools(0).unwrap();
    manager.reset_pools(1).unwrap();

    manager.get_command_buffer(1, 0, false).unwrap();
    manager.get_command_buffer(1, 1, false).unwrap();
    manager.reset_pools(0).unwrap();

    assert_eq!(manager.stats(1).primary_in_use, 2);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_thread_index_out_of_range_panics() {
    let (_device, manager) = create_manager(2, 1);
    let _ = manager.get_command_buffer(0, 1, false);
}

// ============================================================================
// SECONDARY BUFFERS
// ============================================================================

#[test]
fn test_secondary_buffer_with_inheritance() {
    let (device, manager) = create_manager(2, 1);
    manager.reset_pools(0).unwrap();

    let inheritance = InheritanceInfo {
        color_formats: vec![TextureFormat::B8G8R8A8_SRGB],
        depth_format: Some(TextureFormat::D32_SFLOAT),
    };
    let mut secondary = manager
        .get_secondary_command_buffer(0, 0, Some(&inheritance))
        .unwrap();
    assert_eq!(secondary.level(), CommandBufferLevel::Secondary);
    assert!(secondary.is_recording());
    secondary.end().unwrap();

    let mut primary = manager.get_command_buffer(0, 0, true).unwrap();
    primary.execute_commands(std::slice::from_ref(&secondary));
    primary.end().unwrap();

    assert_eq!(
        device.commands(secondary.raw()),
        vec!["begin(RenderPassContinue)", "end"]
    );
    assert_eq!(
        device.commands(primary.raw()),
        vec!["begin(OneTimeSubmit)", "execute_commands(1)", "end"]
    );
}

#[test]
#[should_panic(expected = "budget exhausted")]
fn test_secondary_budget_overrun_panics() {
    let (_device, manager) = create_manager(1, 1);
    manager.reset_pools(0).unwrap();
    for _ in 0..=MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD {
        let _ = manager.get_secondary_command_buffer(0, 0, None);
    }
}

// ============================================================================
// RECORDING STATE CHECKS
// ============================================================================

#[test]
#[should_panic(expected = "not recording")]
fn test_record_without_begin_panics() {
    let (_device, manager) = create_manager(1, 1);
    manager.reset_pools(0).unwrap();
    let mut cmd = manager.get_command_buffer(0, 0, false).unwrap();
    cmd.pipeline_barrier(&[], &[]);
}

#[test]
#[should_panic(expected = "executed before end")]
fn test_execute_unfinished_secondary_panics() {
    let (_device, manager) = create_manager(1, 1);
    manager.reset_pools(0).unwrap();
    let secondary = manager
        .get_secondary_command_buffer(0, 0, Some(&InheritanceInfo::default()))
        .unwrap();
    let mut primary = manager.get_command_buffer(0, 0, true).unwrap();
    primary.execute_commands(&[secondary]);
}

#[test]
fn test_immediate_submit_through_manager() {
    let (device, manager) = create_manager(2, 1);
    manager.immediate_submit(QueueType::Transfer, |_| Ok(())).unwrap();
    assert_eq!(device.submissions().len(), 1);
}

use super::*;
use crate::error::Error;
use crate::gpu_device::{BufferCopy, MockGpuDevice, MockObjectKind, RawBuffer};

fn submitter(device: &Arc<MockGpuDevice>) -> ImmediateSubmitter {
    ImmediateSubmitter::new(Arc::clone(device) as Arc<dyn GpuDevice>).unwrap()
}

// ============================================================================
// QUEUE SELECTION
// ============================================================================

#[test]
fn test_transfer_falls_back_to_graphics() {
    let device = Arc::new(MockGpuDevice::new());
    let immediate = submitter(&device);

    assert!(!immediate.has_dedicated_transfer());
    assert_eq!(immediate.resolve_queue(QueueType::Transfer), QueueType::Graphics);

    immediate.submit(QueueType::Transfer, |_| Ok(())).unwrap();
    let submissions = device.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].queue, QueueType::Graphics);
}

#[test]
fn test_dedicated_transfer_queue_used() {
    let device = Arc::new(MockGpuDevice::with_dedicated_transfer_queue());
    let immediate = submitter(&device);

    assert!(immediate.has_dedicated_transfer());
    immediate.submit(QueueType::Transfer, |_| Ok(())).unwrap();
    immediate.submit(QueueType::Graphics, |_| Ok(())).unwrap();

    let queues: Vec<QueueType> = device.submissions().iter().map(|s| s.queue).collect();
    assert_eq!(queues, vec![QueueType::Transfer, QueueType::Graphics]);
    // One pool and one fence per queue
    assert_eq!(device.live_count(MockObjectKind::CommandPool), 2);
    assert_eq!(device.live_count(MockObjectKind::Fence), 2);
}

// ============================================================================
// SUBMIT SEQUENCE
// ============================================================================

#[test]
fn test_submit_records_and_waits() {
    let device = Arc::new(MockGpuDevice::new());
    let immediate = submitter(&device);

    let mut recorded = None;
    immediate
        .submit(QueueType::Graphics, |cmd| {
            cmd.copy_buffer(
                RawBuffer(1),
                RawBuffer(2),
                &[BufferCopy { src_offset: 0, dst_offset: 0, size: 4 }],
            );
            recorded = Some(cmd.raw());
            Ok(())
        })
        .unwrap();

    let cb = recorded.unwrap();
    assert_eq!(
        device.commands(cb),
        vec!["begin(OneTimeSubmit)", "copy_buffer(1 -> 2)", "end"]
    );
    let submission = &device.submissions()[0];
    assert_eq!(submission.command_buffers, vec![cb]);
    assert!(device.is_fence_signaled(submission.fence.unwrap()));
    // Initial wait plus completion wait
    assert_eq!(device.stats().fence_waits, 2);
}

#[test]
fn test_repeated_submits_reuse_command_buffer() {
    let device = Arc::new(MockGpuDevice::new());
    let immediate = submitter(&device);

    for _ in 0..3 {
        immediate.submit(QueueType::Graphics, |_| Ok(())).unwrap();
    }

    let submissions = device.submissions();
    assert_eq!(submissions.len(), 3);
    assert_eq!(submissions[0].command_buffers, submissions[2].command_buffers);
    assert_eq!(device.stats().command_buffers_allocated, 1);
}

#[test]
fn test_record_error_skips_submit() {
    let device = Arc::new(MockGpuDevice::new());
    let immediate = submitter(&device);

    let result = immediate.submit(QueueType::Graphics, |_| {
        Err(Error::InvalidResource("bad upload".to_string()))
    });
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(device.submissions().is_empty());

    // The context is still usable afterwards
    immediate.submit(QueueType::Graphics, |_| Ok(())).unwrap();
    assert_eq!(device.submissions().len(), 1);
}

#[test]
fn test_concurrent_callers_are_serialized() {
    let device = Arc::new(MockGpuDevice::new());
    let immediate = submitter(&device);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..8 {
                    immediate.submit(QueueType::Graphics, |_| Ok(())).unwrap();
                }
            });
        }
    });

    assert_eq!(device.submissions().len(), 32);
}

// ============================================================================
// DROP
// ============================================================================

#[test]
fn test_drop_releases_native_objects() {
    let device = Arc::new(MockGpuDevice::with_dedicated_transfer_queue());
    drop(submitter(&device));
    assert_eq!(device.live_count(MockObjectKind::CommandPool), 0);
    assert_eq!(device.live_count(MockObjectKind::Fence), 0);
}

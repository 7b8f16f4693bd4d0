use super::*;

// ============================================================================
// QUEUE FAMILY SELECTION
// ============================================================================

#[test]
fn test_select_queue_families_graphics_only() {
    let families = [vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER];

    let selected = select_queue_families(&families).unwrap();

    assert_eq!(selected.graphics, 0);
    assert_eq!(selected.transfer, None);
}

#[test]
fn test_select_queue_families_prefers_transfer_only_family() {
    let families = [
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING,
    ];

    let selected = select_queue_families(&families).unwrap();

    assert_eq!(selected.graphics, 0);
    assert_eq!(selected.transfer, Some(2));
}

#[test]
fn test_select_queue_families_falls_back_to_async_compute() {
    let families = [
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
    ];

    let selected = select_queue_families(&families).unwrap();

    assert_eq!(selected.transfer, Some(1));
}

#[test]
fn test_select_queue_families_without_graphics() {
    let families = [vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER];

    assert!(select_queue_families(&families).is_none());
}

use super::*;

// ============================================================================
// Basic allocation tests
// ============================================================================

#[test]
fn test_sequential_obtain() {
    let mut pool = SlotPool::new("test", 4);
    assert_eq!(pool.obtain().unwrap(), 0);
    assert_eq!(pool.obtain().unwrap(), 1);
    assert_eq!(pool.obtain().unwrap(), 2);
    assert_eq!(pool.len(), 3);
}

#[test]
fn test_new_is_empty() {
    let pool = SlotPool::new("test", 8);
    assert!(pool.is_empty());
    assert!(!pool.is_full());
    assert_eq!(pool.capacity(), 8);
    assert_eq!(pool.name(), "test");
}

// ============================================================================
// Capacity tests
// ============================================================================

#[test]
fn test_obtain_past_capacity_fails() {
    let mut pool = SlotPool::new("buffers", 2);
    pool.obtain().unwrap();
    pool.obtain().unwrap();
    assert!(pool.is_full());

    match pool.obtain() {
        Err(Error::OutOfSlots { pool: name, capacity }) => {
            assert_eq!(name, "buffers");
            assert_eq!(capacity, 2);
        }
        other => panic!("expected OutOfSlots, got {:?}", other),
    }
}

#[test]
fn test_live_count_never_exceeds_capacity() {
    let mut pool = SlotPool::new("test", 3);
    let mut live = Vec::new();

    // Interleaved obtain/release sequence
    for step in 0..50u32 {
        if step % 3 == 2 {
            if let Some(id) = live.pop() {
                pool.release(id);
            }
        } else if let Ok(id) = pool.obtain() {
            live.push(id);
        }
        assert!(pool.len() <= pool.capacity());
        assert_eq!(pool.len() as usize, live.len());
    }
}

#[test]
fn test_zero_capacity() {
    let mut pool = SlotPool::new("empty", 0);
    assert!(pool.obtain().is_err());
}

// ============================================================================
// Release and recycle tests
// ============================================================================

#[test]
fn test_release_and_recycle_lifo() {
    let mut pool = SlotPool::new("test", 4);
    let a = pool.obtain().unwrap(); // 0
    let _b = pool.obtain().unwrap(); // 1
    let c = pool.obtain().unwrap(); // 2

    pool.release(a);
    pool.release(c);

    // Last released is first recycled
    assert_eq!(pool.obtain().unwrap(), 2);
    assert_eq!(pool.obtain().unwrap(), 0);
    assert_eq!(pool.obtain().unwrap(), 3);
}

#[test]
fn test_release_after_full_allows_obtain() {
    let mut pool = SlotPool::new("test", 1);
    let a = pool.obtain().unwrap();
    assert!(pool.obtain().is_err());
    pool.release(a);
    assert_eq!(pool.obtain().unwrap(), a);
}

#[test]
#[should_panic(expected = "not in use")]
fn test_double_release_panics() {
    let mut pool = SlotPool::new("test", 2);
    let a = pool.obtain().unwrap();
    pool.release(a);
    pool.release(a);
}

#[test]
#[should_panic(expected = "not in use")]
fn test_release_out_of_range_panics() {
    let mut pool = SlotPool::new("test", 2);
    pool.release(99);
}

#[test]
fn test_occupied_indices() {
    let mut pool = SlotPool::new("test", 4);
    let a = pool.obtain().unwrap();
    let b = pool.obtain().unwrap();
    let _c = pool.obtain().unwrap();
    pool.release(b);

    let ids: Vec<u32> = pool.occupied_indices().collect();
    assert_eq!(ids, vec![a, 2]);
    assert!(pool.is_occupied(a));
    assert!(!pool.is_occupied(b));
}

// ============================================================================
// Shutdown tests
// ============================================================================

#[test]
fn test_shutdown_clean() {
    let mut pool = SlotPool::new("test", 2);
    let a = pool.obtain().unwrap();
    pool.release(a);
    assert_eq!(pool.shutdown(), 0);
}

#[test]
fn test_shutdown_reports_leaks() {
    let mut pool = SlotPool::new("test", 4);
    pool.obtain().unwrap();
    pool.obtain().unwrap();
    assert_eq!(pool.shutdown(), 2);
    assert!(pool.is_empty());
    assert_eq!(pool.obtain().unwrap(), 0);
}

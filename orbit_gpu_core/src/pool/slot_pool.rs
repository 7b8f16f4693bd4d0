use crate::error::{Error, Result};
use crate::engine_error;

/// Fixed-capacity allocator of stable `u32` slot indices.
///
/// Capacity is chosen at construction and never grows: obtaining past it
/// fails with `OutOfSlots`. Freed indices are recycled LIFO, so both
/// `obtain` and `release` are O(1).
///
/// # Example
///
/// ```
/// use orbit_gpu_core::orbit::pool::SlotPool;
///
/// let mut pool = SlotPool::new("buffers", 2);
/// let a = pool.obtain().unwrap();  // 0
/// let _b = pool.obtain().unwrap(); // 1
/// assert!(pool.obtain().is_err()); // full
/// pool.release(a);
/// assert_eq!(pool.obtain().unwrap(), 0); // recycled
/// ```
pub struct SlotPool {
    name: String,
    capacity: u32,
    free_list: Vec<u32>,
    next_id: u32,
    occupied: Vec<bool>,
    len: u32,
}

impl SlotPool {
    /// Create a pool of `capacity` slots
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            free_list: Vec::with_capacity(capacity as usize),
            next_id: 0,
            occupied: vec![false; capacity as usize],
            len: 0,
        }
    }

    /// Obtain a free slot index
    pub fn obtain(&mut self) -> Result<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None if self.next_id < self.capacity => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
            None => {
                return Err(Error::OutOfSlots {
                    pool: self.name.clone(),
                    capacity: self.capacity,
                })
            }
        };
        self.occupied[id as usize] = true;
        self.len += 1;
        Ok(id)
    }

    /// Return a slot to the pool
    ///
    /// # Panics
    ///
    /// Panics if the slot is not currently obtained (double release).
    pub fn release(&mut self, id: u32) {
        assert!(
            self.is_occupied(id),
            "SlotPool '{}': releasing slot {} which is not in use",
            self.name,
            id
        );
        self.occupied[id as usize] = false;
        self.len -= 1;
        self.free_list.push(id);
    }

    /// Whether `id` is currently obtained
    pub fn is_occupied(&self, id: u32) -> bool {
        self.occupied.get(id as usize).copied().unwrap_or(false)
    }

    /// Indices of every obtained slot, in ascending order
    pub fn occupied_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.occupied
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(id, _)| id as u32)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of currently obtained slots
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Release every slot, logging any that were still obtained
    ///
    /// Returns the number of leaked slots.
    pub fn shutdown(&mut self) -> u32 {
        let leaked = self.len;
        if leaked > 0 {
            engine_error!(
                "orbit::SlotPool",
                "Pool '{}' shut down with {} slot(s) still in use",
                self.name,
                leaked
            );
        }
        self.free_list.clear();
        self.occupied.iter_mut().for_each(|used| *used = false);
        self.next_id = 0;
        self.len = 0;
        leaked
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_pool_tests.rs"]
mod tests;

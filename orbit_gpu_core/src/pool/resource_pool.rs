use crate::error::Result;
use crate::pool::slot_pool::SlotPool;

/// Element stored in a [`ResourcePool`]
///
/// Records that want to know their own slot index override
/// `set_pool_index`; it is called once, when the element is placed.
pub trait PoolElement {
    fn set_pool_index(&mut self, _index: u32) {}
}

/// [`SlotPool`] with typed storage
///
/// Storage is allocated once at construction (`capacity` empty slots) and is
/// never reallocated, so references returned by `access` stay valid until the
/// slot is released.
pub struct ResourcePool<T: PoolElement> {
    slots: SlotPool,
    storage: Vec<Option<T>>,
}

impl<T: PoolElement> ResourcePool<T> {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        let mut storage = Vec::with_capacity(capacity as usize);
        storage.resize_with(capacity as usize, || None);
        Self {
            slots: SlotPool::new(name, capacity),
            storage,
        }
    }

    /// Place `value` into a free slot and return its index
    ///
    /// On exhaustion `value` is dropped and `OutOfSlots` is returned.
    pub fn obtain(&mut self, mut value: T) -> Result<u32> {
        let index = self.slots.obtain()?;
        value.set_pool_index(index);
        self.storage[index as usize] = Some(value);
        Ok(index)
    }

    /// Element in slot `index`, or `None` for a free or out-of-range slot
    pub fn access(&self, index: u32) -> Option<&T> {
        self.storage.get(index as usize).and_then(Option::as_ref)
    }

    pub fn access_mut(&mut self, index: u32) -> Option<&mut T> {
        self.storage.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Remove the element from slot `index` and free the slot
    ///
    /// # Panics
    ///
    /// Panics if the slot is not in use.
    pub fn release(&mut self, index: u32) -> T {
        self.slots.release(index);
        match self.storage[index as usize].take() {
            Some(value) => value,
            None => unreachable!("occupied slot {} has no element", index),
        }
    }

    /// Iterate over `(index, element)` for every occupied slot
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index as u32, value)))
    }

    pub fn name(&self) -> &str {
        self.slots.name()
    }

    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    pub fn len(&self) -> u32 {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Drain every remaining element, logging leaks
    ///
    /// Returns the leaked elements so the owner can release their native objects.
    pub fn shutdown(&mut self) -> Vec<(u32, T)> {
        let leaked: Vec<(u32, T)> = self
            .storage
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|value| (index as u32, value)))
            .collect();
        self.slots.shutdown();
        leaked
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "resource_pool_tests.rs"]
mod tests;

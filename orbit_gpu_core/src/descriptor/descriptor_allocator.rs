//! Growable descriptor set allocation
//!
//! A [`DescriptorAllocator`] hands out descriptor sets from a list of native
//! pools, opening a new pool whenever the current one is full. The frame
//! pipeline resets one allocator per (frame slot, thread) cell each frame;
//! every reset bumps the allocator's epoch so binders know their cached sets
//! are gone.

use crate::engine_info;
use crate::error::Result;
use crate::gpu_device::{
    DescriptorPoolDesc, DescriptorType, GpuDevice, RawDescriptorPool, RawDescriptorSet,
    RawDescriptorSetLayout,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Descriptor counts reserved per pool, relative to its set count
pub fn default_pool_sizes(max_sets: u32) -> Vec<(DescriptorType, u32)> {
    vec![
        (DescriptorType::UniformBuffer, max_sets),
        (DescriptorType::UniformBufferDynamic, max_sets / 2),
        (DescriptorType::StorageBuffer, max_sets),
        (DescriptorType::StorageBufferDynamic, max_sets / 4),
        (DescriptorType::CombinedImageSampler, max_sets * 2),
        (DescriptorType::SampledImage, max_sets),
        (DescriptorType::StorageImage, max_sets / 4),
        (DescriptorType::Sampler, max_sets / 4),
    ]
}

pub struct DescriptorAllocator {
    device: Arc<dyn GpuDevice>,
    id: u64,
    // Shared with the binders' cached sets so they can tell when a reset happened
    epoch: Arc<AtomicU64>,
    pool_desc: DescriptorPoolDesc,
    current: Option<RawDescriptorPool>,
    used_pools: Vec<RawDescriptorPool>,
    free_pools: Vec<RawDescriptorPool>,
}

impl DescriptorAllocator {
    /// Create an allocator whose pools hold `max_sets` sets each
    ///
    /// No native pool is created until the first allocation.
    pub fn new(device: Arc<dyn GpuDevice>, max_sets: u32) -> Self {
        Self {
            device,
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            epoch: Arc::new(AtomicU64::new(0)),
            pool_desc: DescriptorPoolDesc {
                max_sets,
                sizes: default_pool_sizes(max_sets),
                update_after_bind: false,
            },
            current: None,
            used_pools: Vec::new(),
            free_pools: Vec::new(),
        }
    }

    /// Process-unique identifier of this allocator
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of resets so far
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Live epoch counter, readable after the allocator has been released
    pub(crate) fn epoch_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.epoch)
    }

    /// Native pools owned (in use and recycled)
    pub fn pool_count(&self) -> usize {
        self.used_pools.len() + self.free_pools.len()
    }

    fn grab_pool(&mut self) -> Result<RawDescriptorPool> {
        let pool = match self.free_pools.pop() {
            Some(pool) => pool,
            None => self.device.create_descriptor_pool(&self.pool_desc)?,
        };
        self.used_pools.push(pool);
        self.current = Some(pool);
        Ok(pool)
    }

    /// Allocate one set, growing onto a new pool when the current one is full
    pub fn allocate(&mut self, layout: RawDescriptorSetLayout) -> Result<RawDescriptorSet> {
        let pool = match self.current {
            Some(pool) => pool,
            None => self.grab_pool()?,
        };
        if let Some(set) = self.device.allocate_descriptor_set(pool, layout)? {
            return Ok(set);
        }

        let pool = self.grab_pool()?;
        engine_info!(
            "orbit::DescriptorAllocator",
            "Descriptor pool full, growing to {} pools ({} sets each)",
            self.used_pools.len(),
            self.pool_desc.max_sets
        );
        match self.device.allocate_descriptor_set(pool, layout)? {
            Some(set) => Ok(set),
            None => Err(crate::engine_err!(
                "orbit::DescriptorAllocator",
                "Allocation failed on a fresh descriptor pool"
            )),
        }
    }

    /// Reset every pool, invalidating all sets allocated since the last reset
    pub fn reset(&mut self) -> Result<()> {
        for pool in &self.used_pools {
            self.device.reset_descriptor_pool(*pool)?;
        }
        self.free_pools.append(&mut self.used_pools);
        self.current = None;
        self.epoch.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.used_pools.drain(..).chain(self.free_pools.drain(..)) {
            self.device.destroy_descriptor_pool(pool);
        }
    }
}

/// One [`DescriptorAllocator`] per (frame slot, thread) cell
pub struct DescriptorAllocatorGrid {
    frames_in_flight: u32,
    num_threads: u32,
    cells: Vec<Mutex<DescriptorAllocator>>,
}

impl DescriptorAllocatorGrid {
    pub fn new(device: Arc<dyn GpuDevice>, frames_in_flight: u32, num_threads: u32, max_sets: u32) -> Self {
        let cells = (0..frames_in_flight * num_threads)
            .map(|_| Mutex::new(DescriptorAllocator::new(Arc::clone(&device), max_sets)))
            .collect();
        Self {
            frames_in_flight,
            num_threads,
            cells,
        }
    }

    /// Lock the allocator of one cell
    pub fn lock(&self, frame_slot: u32, thread_index: u32) -> MutexGuard<'_, DescriptorAllocator> {
        assert!(
            frame_slot < self.frames_in_flight && thread_index < self.num_threads,
            "descriptor allocator cell ({}, {}) out of range ({} x {})",
            frame_slot,
            thread_index,
            self.frames_in_flight,
            self.num_threads
        );
        let index = (frame_slot * self.num_threads + thread_index) as usize;
        self.cells[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset every thread's allocator of `frame_slot`
    pub fn reset_frame(&self, frame_slot: u32) -> Result<()> {
        for thread_index in 0..self.num_threads {
            self.lock(frame_slot, thread_index).reset()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "descriptor_allocator_tests.rs"]
mod tests;

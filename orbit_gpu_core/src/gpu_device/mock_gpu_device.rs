//! Mock GPU device for tests (no GPU required)
//!
//! Implements [`GpuDevice`] entirely in memory. Native handles are counters,
//! buffers are byte vectors, and command buffers record their commands as
//! strings so tests can assert on what the core recorded. Submission signals
//! the fence immediately.

use crate::error::{Error, Result};
use crate::gpu_device::{
    BufferCopy, BufferDesc, BufferBarrier, BufferImageCopy, CommandBufferLevel,
    CommandBufferUsage, DescriptorPoolDesc, DescriptorResource, DescriptorSetLayoutBinding,
    DescriptorUpdate, GpuDevice, ImageBarrier, InheritanceInfo, PipelineBindPoint, QueueType,
    RawBuffer, RawCommandBuffer, RawCommandPool, RawDescriptorPool, RawDescriptorSet,
    RawDescriptorSetLayout, RawFence, RawImage, RawImageView, RawPipelineCache,
    RawPipelineLayout, RawSampler, RawSemaphore, SamplerDesc, SubmitInfo, TextureDesc,
    TextureViewDesc,
};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Prefix every pipeline cache blob produced by the mock starts with
pub const MOCK_PIPELINE_CACHE_MAGIC: &[u8] = b"ORBITMOCKPSO";

// ============================================================================
// Mock bookkeeping types
// ============================================================================

/// Kind of a native object tracked by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockObjectKind {
    Buffer,
    Image,
    ImageView,
    Sampler,
    CommandPool,
    Fence,
    Semaphore,
    DescriptorPool,
    DescriptorSetLayout,
    PipelineLayout,
    PipelineCache,
}

/// Running counters, readable through [`MockGpuDevice::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockDeviceStats {
    pub buffers_created: u32,
    pub buffers_destroyed: u32,
    pub images_created: u32,
    pub images_destroyed: u32,
    pub image_views_created: u32,
    pub image_views_destroyed: u32,
    pub samplers_created: u32,
    pub samplers_destroyed: u32,
    pub command_pool_resets: u32,
    pub command_buffers_allocated: u32,
    pub descriptor_pools_created: u32,
    pub descriptor_pool_resets: u32,
    pub descriptor_sets_allocated: u32,
    pub descriptor_update_calls: u32,
    pub descriptor_writes: u32,
    pub submissions: u32,
    pub fence_waits: u32,
    pub wait_idle_calls: u32,
}

/// One recorded queue submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSubmission {
    pub queue: QueueType,
    pub command_buffers: Vec<RawCommandBuffer>,
    pub fence: Option<RawFence>,
}

#[derive(Debug)]
struct MockCommandBuffer {
    pool: u64,
    level: CommandBufferLevel,
    recording: bool,
    commands: Vec<String>,
}

#[derive(Debug)]
struct MockDescriptorPool {
    max_sets: u32,
    sets: Vec<u64>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    live: FxHashMap<u64, MockObjectKind>,
    buffers: FxHashMap<u64, (BufferDesc, Vec<u8>)>,
    command_buffers: FxHashMap<u64, MockCommandBuffer>,
    pool_queues: FxHashMap<u64, QueueType>,
    fences: FxHashMap<u64, bool>,
    descriptor_pools: FxHashMap<u64, MockDescriptorPool>,
    descriptor_writes: FxHashMap<(u64, u32, u32), DescriptorResource>,
    pipeline_caches: FxHashMap<u64, Vec<u8>>,
    submissions: Vec<MockSubmission>,
    stats: MockDeviceStats,
    fail_next_allocation: bool,
}

impl MockState {
    fn create(&mut self, kind: MockObjectKind) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, kind);
        id
    }

    fn destroy(&mut self, id: u64, kind: MockObjectKind) {
        match self.live.remove(&id) {
            Some(found) => assert_eq!(
                found, kind,
                "mock: destroying object {} as {:?} but it is a {:?}",
                id, kind, found
            ),
            None => panic!("mock: {:?} {} destroyed twice or never created", kind, id),
        }
    }

    fn record(&mut self, command_buffer: RawCommandBuffer, command: String) {
        if let Some(cb) = self.command_buffers.get_mut(&command_buffer.0) {
            cb.commands.push(command);
        }
    }
}

// ============================================================================
// MockGpuDevice
// ============================================================================

/// In-memory [`GpuDevice`]
pub struct MockGpuDevice {
    dedicated_transfer: bool,
    state: Mutex<MockState>,
}

impl MockGpuDevice {
    /// Mock device with a single graphics queue
    pub fn new() -> Self {
        Self {
            dedicated_transfer: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Mock device exposing a dedicated transfer queue
    pub fn with_dedicated_transfer_queue() -> Self {
        Self {
            dedicated_transfer: true,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next buffer or image creation fail with `OutOfMemory`
    pub fn fail_next_allocation(&self) {
        self.state().fail_next_allocation = true;
    }

    pub fn stats(&self) -> MockDeviceStats {
        self.state().stats
    }

    /// Number of live native objects of a kind
    pub fn live_count(&self, kind: MockObjectKind) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    /// True if the native object with this raw id has not been destroyed
    pub fn is_alive(&self, raw: u64) -> bool {
        self.state().live.contains_key(&raw)
    }

    pub fn buffer_contents(&self, buffer: RawBuffer) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer.0).map(|(_, data)| data.clone())
    }

    /// Commands recorded into a command buffer since its last begin or reset
    pub fn commands(&self, command_buffer: RawCommandBuffer) -> Vec<String> {
        self.state()
            .command_buffers
            .get(&command_buffer.0)
            .map(|cb| cb.commands.clone())
            .unwrap_or_default()
    }

    pub fn command_buffer_level(&self, command_buffer: RawCommandBuffer) -> Option<CommandBufferLevel> {
        self.state().command_buffers.get(&command_buffer.0).map(|cb| cb.level)
    }

    /// Queue a command pool was created for
    pub fn command_pool_queue(&self, pool: RawCommandPool) -> Option<QueueType> {
        self.state().pool_queues.get(&pool.0).copied()
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.state().submissions.clone()
    }

    pub fn is_fence_signaled(&self, fence: RawFence) -> bool {
        self.state().fences.get(&fence.0).copied().unwrap_or(false)
    }

    /// Resource last written to a descriptor binding
    pub fn descriptor_binding(
        &self,
        set: RawDescriptorSet,
        binding: u32,
        array_element: u32,
    ) -> Option<DescriptorResource> {
        self.state()
            .descriptor_writes
            .get(&(set.0, binding, array_element))
            .copied()
    }
}

impl Default for MockGpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for MockGpuDevice {
    fn has_dedicated_transfer_queue(&self) -> bool {
        self.dedicated_transfer
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().stats.wait_idle_calls += 1;
        Ok(())
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, _name: &str) -> Result<RawBuffer> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_next_allocation) {
            return Err(Error::OutOfMemory);
        }
        if desc.size == 0 {
            return Err(Error::InvalidResource("mock: zero-sized buffer".to_string()));
        }
        let id = state.create(MockObjectKind::Buffer);
        state.buffers.insert(id, (*desc, vec![0; desc.size as usize]));
        state.stats.buffers_created += 1;
        Ok(RawBuffer(id))
    }

    fn destroy_buffer(&self, buffer: RawBuffer) {
        let mut state = self.state();
        state.destroy(buffer.0, MockObjectKind::Buffer);
        state.buffers.remove(&buffer.0);
        state.stats.buffers_destroyed += 1;
    }

    fn write_buffer(&self, buffer: RawBuffer, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let (desc, contents) = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::InvalidResource(format!("mock: unknown buffer {}", buffer.0)))?;
        if !desc.memory.is_host_visible() {
            return Err(Error::InvalidResource("mock: buffer is not host visible".to_string()));
        }
        let size = desc.size;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= size)
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "mock: write of {} bytes at offset {} exceeds buffer size {}",
                    data.len(),
                    offset,
                    size
                ))
            })?;
        contents[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    // ===== IMAGES =====

    fn create_image(&self, _desc: &TextureDesc, _name: &str) -> Result<RawImage> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_next_allocation) {
            return Err(Error::OutOfMemory);
        }
        let id = state.create(MockObjectKind::Image);
        state.stats.images_created += 1;
        Ok(RawImage(id))
    }

    fn create_image_view(
        &self,
        image: RawImage,
        _desc: &TextureDesc,
        _view: &TextureViewDesc,
    ) -> Result<RawImageView> {
        let mut state = self.state();
        if state.live.get(&image.0) != Some(&MockObjectKind::Image) {
            return Err(Error::InvalidResource(format!("mock: unknown image {}", image.0)));
        }
        let id = state.create(MockObjectKind::ImageView);
        state.stats.image_views_created += 1;
        Ok(RawImageView(id))
    }

    fn destroy_image_view(&self, view: RawImageView) {
        let mut state = self.state();
        state.destroy(view.0, MockObjectKind::ImageView);
        state.stats.image_views_destroyed += 1;
    }

    fn destroy_image(&self, image: RawImage) {
        let mut state = self.state();
        state.destroy(image.0, MockObjectKind::Image);
        state.stats.images_destroyed += 1;
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<RawSampler> {
        let mut state = self.state();
        let id = state.create(MockObjectKind::Sampler);
        state.stats.samplers_created += 1;
        Ok(RawSampler(id))
    }

    fn destroy_sampler(&self, sampler: RawSampler) {
        let mut state = self.state();
        state.destroy(sampler.0, MockObjectKind::Sampler);
        state.stats.samplers_destroyed += 1;
    }

    // ===== COMMAND POOLS / BUFFERS =====

    fn create_command_pool(&self, queue: QueueType, _transient: bool) -> Result<RawCommandPool> {
        let mut state = self.state();
        let id = state.create(MockObjectKind::CommandPool);
        state.pool_queues.insert(id, queue);
        Ok(RawCommandPool(id))
    }

    fn reset_command_pool(&self, pool: RawCommandPool) -> Result<()> {
        let mut state = self.state();
        for cb in state.command_buffers.values_mut().filter(|cb| cb.pool == pool.0) {
            cb.recording = false;
            cb.commands.clear();
        }
        state.stats.command_pool_resets += 1;
        Ok(())
    }

    fn destroy_command_pool(&self, pool: RawCommandPool) {
        let mut state = self.state();
        state.destroy(pool.0, MockObjectKind::CommandPool);
        state.pool_queues.remove(&pool.0);
        state.command_buffers.retain(|_, cb| cb.pool != pool.0);
    }

    fn allocate_command_buffers(
        &self,
        pool: RawCommandPool,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<RawCommandBuffer>> {
        let mut state = self.state();
        let mut buffers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            state.next_id += 1;
            let id = state.next_id;
            state.command_buffers.insert(
                id,
                MockCommandBuffer {
                    pool: pool.0,
                    level,
                    recording: false,
                    commands: Vec::new(),
                },
            );
            buffers.push(RawCommandBuffer(id));
        }
        state.stats.command_buffers_allocated += count;
        Ok(buffers)
    }

    fn begin_command_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        usage: CommandBufferUsage,
        _inheritance: Option<&InheritanceInfo>,
    ) -> Result<()> {
        let mut state = self.state();
        let cb = state
            .command_buffers
            .get_mut(&command_buffer.0)
            .ok_or_else(|| Error::InvalidResource("mock: unknown command buffer".to_string()))?;
        cb.recording = true;
        cb.commands.clear();
        cb.commands.push(format!("begin({:?})", usage));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        let mut state = self.state();
        let cb = state
            .command_buffers
            .get_mut(&command_buffer.0)
            .ok_or_else(|| Error::InvalidResource("mock: unknown command buffer".to_string()))?;
        cb.recording = false;
        cb.commands.push("end".to_string());
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        let mut state = self.state();
        if let Some(cb) = state.command_buffers.get_mut(&command_buffer.0) {
            cb.recording = false;
            cb.commands.clear();
        }
        Ok(())
    }

    // ===== RECORDING =====

    fn cmd_copy_buffer(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawBuffer,
        regions: &[BufferCopy],
    ) {
        let mut state = self.state();
        // Transfers complete immediately in the mock
        for region in regions {
            let src_bytes = state.buffers.get(&src.0).map(|(_, data)| {
                data[region.src_offset as usize..(region.src_offset + region.size) as usize].to_vec()
            });
            if let (Some(bytes), Some((_, dst_data))) = (src_bytes, state.buffers.get_mut(&dst.0)) {
                dst_data[region.dst_offset as usize..(region.dst_offset + region.size) as usize]
                    .copy_from_slice(&bytes);
            }
        }
        state.record(command_buffer, format!("copy_buffer({} -> {})", src.0, dst.0));
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: RawCommandBuffer,
        src: RawBuffer,
        dst: RawImage,
        _is_depth: bool,
        region: &BufferImageCopy,
    ) {
        self.state().record(
            command_buffer,
            format!("copy_buffer_to_image({} -> {}, {}x{})", src.0, dst.0, region.width, region.height),
        );
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: RawCommandBuffer,
        buffer_barriers: &[BufferBarrier],
        image_barriers: &[ImageBarrier],
    ) {
        let mut state = self.state();
        for barrier in image_barriers {
            state.record(
                command_buffer,
                format!(
                    "image_barrier({}: {:?} -> {:?})",
                    barrier.image.0, barrier.old_layout, barrier.new_layout
                ),
            );
        }
        for barrier in buffer_barriers {
            state.record(command_buffer, format!("buffer_barrier({})", barrier.buffer.0));
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: RawCommandBuffer,
        _bind_point: PipelineBindPoint,
        _layout: RawPipelineLayout,
        first_set: u32,
        sets: &[RawDescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.state().record(
            command_buffer,
            format!(
                "bind_descriptor_sets(first={}, count={}, dynamic={:?})",
                first_set,
                sets.len(),
                dynamic_offsets
            ),
        );
    }

    fn cmd_execute_commands(&self, command_buffer: RawCommandBuffer, secondaries: &[RawCommandBuffer]) {
        self.state()
            .record(command_buffer, format!("execute_commands({})", secondaries.len()));
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawDescriptorPool> {
        let mut state = self.state();
        let id = state.create(MockObjectKind::DescriptorPool);
        state.descriptor_pools.insert(
            id,
            MockDescriptorPool {
                max_sets: desc.max_sets,
                sets: Vec::new(),
            },
        );
        state.stats.descriptor_pools_created += 1;
        Ok(RawDescriptorPool(id))
    }

    fn reset_descriptor_pool(&self, pool: RawDescriptorPool) -> Result<()> {
        let mut state = self.state();
        let freed = match state.descriptor_pools.get_mut(&pool.0) {
            Some(p) => std::mem::take(&mut p.sets),
            None => {
                return Err(Error::InvalidResource(format!("mock: unknown descriptor pool {}", pool.0)))
            }
        };
        state.descriptor_writes.retain(|(set, _, _), _| !freed.contains(set));
        state.stats.descriptor_pool_resets += 1;
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: RawDescriptorPool) {
        let mut state = self.state();
        state.destroy(pool.0, MockObjectKind::DescriptorPool);
        if let Some(p) = state.descriptor_pools.remove(&pool.0) {
            state.descriptor_writes.retain(|(set, _, _), _| !p.sets.contains(set));
        }
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[DescriptorSetLayoutBinding],
        _update_after_bind: bool,
    ) -> Result<RawDescriptorSetLayout> {
        Ok(RawDescriptorSetLayout(self.state().create(MockObjectKind::DescriptorSetLayout)))
    }

    fn destroy_descriptor_set_layout(&self, layout: RawDescriptorSetLayout) {
        self.state().destroy(layout.0, MockObjectKind::DescriptorSetLayout);
    }

    fn allocate_descriptor_set(
        &self,
        pool: RawDescriptorPool,
        _layout: RawDescriptorSetLayout,
    ) -> Result<Option<RawDescriptorSet>> {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        let p = state
            .descriptor_pools
            .get_mut(&pool.0)
            .ok_or_else(|| Error::InvalidResource(format!("mock: unknown descriptor pool {}", pool.0)))?;
        if p.sets.len() as u32 >= p.max_sets {
            return Ok(None);
        }
        p.sets.push(id);
        state.stats.descriptor_sets_allocated += 1;
        Ok(Some(RawDescriptorSet(id)))
    }

    fn update_descriptor_sets(&self, updates: &[DescriptorUpdate]) {
        let mut state = self.state();
        for update in updates {
            state
                .descriptor_writes
                .insert((update.set.0, update.binding, update.array_element), update.resource);
        }
        state.stats.descriptor_update_calls += 1;
        state.stats.descriptor_writes += updates.len() as u32;
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[RawDescriptorSetLayout],
        _push_constant_size: u32,
    ) -> Result<RawPipelineLayout> {
        Ok(RawPipelineLayout(self.state().create(MockObjectKind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, layout: RawPipelineLayout) {
        self.state().destroy(layout.0, MockObjectKind::PipelineLayout);
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<RawFence> {
        let mut state = self.state();
        let id = state.create(MockObjectKind::Fence);
        state.fences.insert(id, signaled);
        Ok(RawFence(id))
    }

    fn wait_for_fence(&self, fence: RawFence, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.stats.fence_waits += 1;
        match state.fences.get(&fence.0) {
            Some(true) => Ok(()),
            Some(false) => Err(Error::DeviceLost(format!(
                "mock: fence {} was never submitted and cannot signal",
                fence.0
            ))),
            None => Err(Error::InvalidResource(format!("mock: unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&self, fence: RawFence) -> Result<()> {
        let mut state = self.state();
        match state.fences.get_mut(&fence.0) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("mock: unknown fence {}", fence.0))),
        }
    }

    fn destroy_fence(&self, fence: RawFence) {
        let mut state = self.state();
        state.destroy(fence.0, MockObjectKind::Fence);
        state.fences.remove(&fence.0);
    }

    fn create_semaphore(&self) -> Result<RawSemaphore> {
        Ok(RawSemaphore(self.state().create(MockObjectKind::Semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: RawSemaphore) {
        self.state().destroy(semaphore.0, MockObjectKind::Semaphore);
    }

    fn submit(&self, queue: QueueType, info: &SubmitInfo, fence: Option<RawFence>) -> Result<()> {
        let mut state = self.state();
        if queue == QueueType::Transfer && !self.dedicated_transfer {
            return Err(Error::BackendError("mock: no dedicated transfer queue".to_string()));
        }
        for cb in info.command_buffers {
            match state.command_buffers.get(&cb.0) {
                Some(entry) if entry.recording => {
                    return Err(Error::BackendError(format!(
                        "mock: command buffer {} submitted while recording",
                        cb.0
                    )))
                }
                Some(_) => {}
                None => {
                    return Err(Error::InvalidResource(format!("mock: unknown command buffer {}", cb.0)))
                }
            }
        }
        if let Some(fence) = fence {
            state.fences.insert(fence.0, true);
        }
        state.submissions.push(MockSubmission {
            queue,
            command_buffers: info.command_buffers.to_vec(),
            fence,
        });
        state.stats.submissions += 1;
        Ok(())
    }

    // ===== PIPELINE CACHE =====

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<RawPipelineCache> {
        if !initial_data.is_empty() && !initial_data.starts_with(MOCK_PIPELINE_CACHE_MAGIC) {
            return Err(Error::BackendError("mock: incompatible pipeline cache blob".to_string()));
        }
        let mut state = self.state();
        let id = state.create(MockObjectKind::PipelineCache);
        let blob = if initial_data.is_empty() {
            MOCK_PIPELINE_CACHE_MAGIC.to_vec()
        } else {
            initial_data.to_vec()
        };
        state.pipeline_caches.insert(id, blob);
        Ok(RawPipelineCache(id))
    }

    fn pipeline_cache_data(&self, cache: RawPipelineCache) -> Result<Vec<u8>> {
        self.state()
            .pipeline_caches
            .get(&cache.0)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("mock: unknown pipeline cache {}", cache.0)))
    }

    fn destroy_pipeline_cache(&self, cache: RawPipelineCache) {
        let mut state = self.state();
        state.destroy(cache.0, MockObjectKind::PipelineCache);
        state.pipeline_caches.remove(&cache.0);
    }
}

#[cfg(test)]
#[path = "mock_gpu_device_tests.rs"]
mod tests;

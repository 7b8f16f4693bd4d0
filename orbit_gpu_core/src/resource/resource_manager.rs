//! Resource manager
//!
//! Owns one fixed-capacity pool per resource kind and the frame-delayed
//! deletion queue. `destroy_*` never frees anything synchronously: the
//! handle is stamped with the current frame and its native objects are only
//! released by `process_pending_deletions` once `frames_in_flight` frames
//! have completed.
//!
//! Borrowing model: creation, flushing and resizing take `&mut self`;
//! `get_*`, `destroy_*` and host writes take `&self`, so any number of
//! threads can look up and destroy resources through a shared reference.
//! Callers creating resources from several threads wrap the manager in a
//! lock.

use crate::command::{CommandBuffer, ImmediateSubmitter};
use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::gpu_device::{
    barrier_for, needs_barrier, BufferBarrier, BufferCopy, BufferDesc, BufferImageCopy,
    BufferUsage, GpuDevice, ImageBarrier, MemoryUsage, QueueType, RawBuffer, RawImage,
    RawImageView, ResourceState, TextureDesc, TextureUsage, TextureViewDesc,
};
use crate::pool::{BufferHandle, ResourcePool, SamplerHandle, TextureHandle};
use crate::resource::buffer::{Buffer, BufferCreation};
use crate::resource::deletion_queue::{DeletionEntry, DeletionQueue, PendingDeletion};
use crate::resource::sampler::{Sampler, SamplerCreation};
use crate::resource::texture::{Texture, TextureCreation, TextureViewCreation};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Live resource counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub buffers: u32,
    pub textures: u32,
    pub samplers: u32,
    /// Destroyed resources whose native objects are not freed yet
    pub pending_deletions: usize,
    pub current_frame: u64,
}

/// Stored creation parameters of a live texture slot
#[derive(Debug, Clone)]
enum TextureCreationInfo {
    Texture(TextureCreation),
    View(TextureViewCreation),
}

pub struct ResourceManager {
    device: Arc<dyn GpuDevice>,
    immediate: Arc<ImmediateSubmitter>,
    frames_in_flight: u64,
    current_frame: u64,
    buffers: ResourcePool<Buffer>,
    textures: ResourcePool<Texture>,
    samplers: ResourcePool<Sampler>,
    deletion_queue: Mutex<DeletionQueue>,
    // Entries exist exactly while a slot is live (created and not destroyed)
    buffer_creations: Mutex<FxHashMap<u32, BufferCreation>>,
    texture_creations: Mutex<FxHashMap<u32, TextureCreationInfo>>,
    sampler_creations: Mutex<FxHashMap<u32, SamplerCreation>>,
    is_shut_down: bool,
}

/// Bytes expected for the mip 0 upload of every layer
pub fn texture_upload_size(desc: &TextureDesc) -> u64 {
    desc.width as u64
        * desc.height as u64
        * desc.depth as u64
        * desc.array_layers as u64
        * desc.format.bytes_per_pixel() as u64
}

fn image_barrier(image: RawImage, is_depth: bool, old: ResourceState, new: ResourceState) -> ImageBarrier {
    let masks = barrier_for(old, new);
    ImageBarrier {
        image,
        is_depth,
        src_stages: masks.src_stages,
        dst_stages: masks.dst_stages,
        src_access: masks.src_access,
        dst_access: masks.dst_access,
        old_layout: masks.old_layout,
        new_layout: masks.new_layout,
    }
}

fn log_native_failure<T>(what: &str, name: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        engine_error!("orbit::ResourceManager", "Failed to create {} '{}': {}", what, name, e);
        e
    })
}

impl ResourceManager {
    /// Create the pools described by `config`
    ///
    /// `immediate` is used for staging uploads of initial data.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        immediate: Arc<ImmediateSubmitter>,
        config: &CoreConfig,
    ) -> Result<Self> {
        config.validate()?;

        engine_info!(
            "orbit::ResourceManager",
            "Created (buffers: {}, textures: {}, samplers: {}, frames in flight: {})",
            config.max_buffers,
            config.max_textures,
            config.max_samplers,
            config.frames_in_flight
        );

        Ok(Self {
            device,
            immediate,
            frames_in_flight: config.frames_in_flight as u64,
            current_frame: 0,
            buffers: ResourcePool::new("buffers", config.max_buffers),
            textures: ResourcePool::new("textures", config.max_textures),
            samplers: ResourcePool::new("samplers", config.max_samplers),
            deletion_queue: Mutex::new(DeletionQueue::new()),
            buffer_creations: Mutex::new(FxHashMap::default()),
            texture_creations: Mutex::new(FxHashMap::default()),
            sampler_creations: Mutex::new(FxHashMap::default()),
            is_shut_down: false,
        })
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight as u32
    }

    /// Frame number that `destroy_*` stamps onto deletion entries
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Advance the frame counter
    ///
    /// # Panics
    ///
    /// Panics if `frame` goes backwards.
    pub fn set_current_frame(&mut self, frame: u64) {
        assert!(
            frame >= self.current_frame,
            "ResourceManager: frame counter moved backwards ({} -> {})",
            self.current_frame,
            frame
        );
        self.current_frame = frame;
    }

    fn out_of_slots<T: crate::pool::PoolElement>(pool: &ResourcePool<T>, name: &str) -> Error {
        engine_warn!(
            "orbit::ResourceManager",
            "Pool '{}' exhausted ({} slots), cannot create '{}'",
            pool.name(),
            pool.capacity(),
            name
        );
        Error::OutOfSlots {
            pool: pool.name().to_string(),
            capacity: pool.capacity(),
        }
    }

    fn is_live_buffer(&self, handle: BufferHandle) -> bool {
        self.buffer_creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.index)
    }

    fn is_live_texture(&self, handle: TextureHandle) -> bool {
        self.texture_creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.index)
    }

    // ===== BUFFERS =====

    /// Create a buffer, uploading `initial_data` if present
    ///
    /// Host-visible buffers are written through their mapping; device-local
    /// buffers go through a staging buffer on the transfer queue.
    pub fn create_buffer(&mut self, mut creation: BufferCreation) -> Result<BufferHandle> {
        if self.buffers.is_full() {
            return Err(Self::out_of_slots(&self.buffers, &creation.name));
        }

        let initial_data = creation.initial_data.take();
        if let Some(data) = &initial_data {
            if data.len() as u64 > creation.desc.size {
                return Err(Error::InvalidResource(format!(
                    "buffer '{}': initial data ({} bytes) larger than buffer ({} bytes)",
                    creation.name,
                    data.len(),
                    creation.desc.size
                )));
            }
        }

        let (raw, parent, global_offset) = match creation.alias_of {
            Some((parent, offset)) => {
                if !self.is_live_buffer(parent) {
                    return Err(Error::InvalidResource(format!(
                        "buffer '{}': alias parent {} is not a live buffer",
                        creation.name, parent.index
                    )));
                }
                let parent_buffer = self.get_buffer(parent).ok_or_else(|| {
                    Error::InvalidResource(format!("buffer '{}': alias parent missing", creation.name))
                })?;
                if parent_buffer.is_alias() {
                    return Err(Error::InvalidResource(format!(
                        "buffer '{}': cannot alias another alias",
                        creation.name
                    )));
                }
                let in_range = offset
                    .checked_add(creation.desc.size)
                    .is_some_and(|end| end <= parent_buffer.size);
                if !in_range {
                    return Err(Error::InvalidResource(format!(
                        "buffer '{}': alias of {} bytes at offset {} exceeds parent size {}",
                        creation.name, creation.desc.size, offset, parent_buffer.size
                    )));
                }
                creation.desc.memory = parent_buffer.memory;
                (parent_buffer.raw, parent, parent_buffer.global_offset + offset)
            }
            None => {
                if initial_data.is_some() && !creation.desc.memory.is_host_visible() {
                    creation.desc.usage |= BufferUsage::TRANSFER_DST;
                }
                let raw = log_native_failure(
                    "buffer",
                    &creation.name,
                    self.device.create_buffer(&creation.desc, &creation.name),
                )?;
                (raw, BufferHandle::INVALID, 0)
            }
        };

        let mut state = ResourceState::UNDEFINED;
        if let Some(data) = &initial_data {
            match self.upload_buffer(raw, global_offset, creation.desc.memory, data) {
                Ok(uploaded_state) => state = uploaded_state,
                Err(e) => {
                    if !parent.is_valid() {
                        self.device.destroy_buffer(raw);
                    }
                    return Err(e);
                }
            }
        }
        // Aliases share the parent's native buffer and therefore its state
        if parent.is_valid() {
            if state != ResourceState::UNDEFINED {
                if let Some(parent_buffer) = self.buffers.access_mut(parent.index) {
                    parent_buffer.state = state;
                }
            }
            state = ResourceState::UNDEFINED;
        }

        let index = self.buffers.obtain(Buffer {
            raw,
            size: creation.desc.size,
            usage: creation.desc.usage,
            memory: creation.desc.memory,
            state,
            parent,
            global_offset,
            name: creation.name.clone(),
            pool_index: u32::MAX,
        })?;

        engine_debug!(
            "orbit::ResourceManager",
            "Created buffer '{}' (slot {}, {} bytes)",
            creation.name,
            index,
            creation.desc.size
        );
        self.buffer_creations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, creation);

        Ok(BufferHandle::new(index))
    }

    fn upload_buffer(
        &self,
        raw: RawBuffer,
        offset: u64,
        memory: MemoryUsage,
        data: &[u8],
    ) -> Result<ResourceState> {
        if memory.is_host_visible() {
            self.device.write_buffer(raw, offset, data)?;
            return Ok(ResourceState::UNDEFINED);
        }

        let staging = self.device.create_buffer(
            &BufferDesc {
                size: data.len() as u64,
                usage: BufferUsage::TRANSFER_SRC,
                memory: MemoryUsage::CpuToGpu,
            },
            "staging",
        )?;
        let result = self.device.write_buffer(staging, 0, data).and_then(|_| {
            self.immediate.submit(QueueType::Transfer, |cmd| {
                cmd.copy_buffer(
                    staging,
                    raw,
                    &[BufferCopy {
                        src_offset: 0,
                        dst_offset: offset,
                        size: data.len() as u64,
                    }],
                );
                Ok(())
            })
        });
        // The immediate submit has completed, so the staging buffer is idle
        self.device.destroy_buffer(staging);
        result.map(|_| ResourceState::COPY_DEST)
    }

    /// Buffer record, or `None` for an invalid or freed handle
    pub fn get_buffer(&self, handle: BufferHandle) -> Option<&Buffer> {
        self.buffers.access(handle.index)
    }

    /// Schedule a buffer for destruction once in-flight frames complete
    ///
    /// # Panics
    ///
    /// Panics if the buffer was already destroyed.
    pub fn destroy_buffer(&self, handle: BufferHandle) {
        if self.buffers.access(handle.index).is_none() {
            engine_warn!("orbit::ResourceManager", "destroy_buffer: invalid handle {}", handle.index);
            return;
        }

        let (removed, has_aliases) = {
            let mut creations = self.buffer_creations.lock().unwrap_or_else(PoisonError::into_inner);
            let removed = creations.remove(&handle.index);
            let has_aliases = creations
                .values()
                .any(|c| c.alias_of.map(|(parent, _)| parent) == Some(handle));
            (removed, has_aliases)
        };
        assert!(removed.is_some(), "ResourceManager: buffer {} destroyed twice", handle.index);

        if has_aliases {
            engine_warn!(
                "orbit::ResourceManager",
                "Buffer {} destroyed while aliases of it are still live",
                handle.index
            );
        }

        self.deletion_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .enqueue(PendingDeletion::Buffer(handle), self.current_frame);
    }

    /// Write bytes into a host-visible buffer
    pub fn write_buffer(&self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self
            .get_buffer(handle)
            .ok_or_else(|| Error::InvalidResource(format!("write_buffer: invalid handle {}", handle.index)))?;
        if !buffer.memory.is_host_visible() {
            return Err(Error::InvalidResource(format!(
                "write_buffer: buffer '{}' is not host visible",
                buffer.name
            )));
        }
        let in_range = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= buffer.size);
        if !in_range {
            return Err(Error::InvalidResource(format!(
                "write_buffer: {} bytes at offset {} exceed buffer '{}' ({} bytes)",
                data.len(),
                offset,
                buffer.name,
                buffer.size
            )));
        }
        self.device
            .write_buffer(buffer.raw, buffer.global_offset + offset, data)
    }

    /// Write one plain-old-data value into a host-visible buffer
    pub fn write_buffer_pod<T: bytemuck::Pod>(&self, handle: BufferHandle, offset: u64, value: &T) -> Result<()> {
        self.write_buffer(handle, offset, bytemuck::bytes_of(value))
    }

    /// Write a slice of plain-old-data values into a host-visible buffer
    pub fn write_buffer_slice<T: bytemuck::Pod>(
        &self,
        handle: BufferHandle,
        offset: u64,
        values: &[T],
    ) -> Result<()> {
        self.write_buffer(handle, offset, bytemuck::cast_slice(values))
    }

    // Record holding the state of the native buffer behind `handle`
    fn buffer_state_owner(&self, handle: BufferHandle) -> Option<BufferHandle> {
        self.get_buffer(handle)
            .map(|buffer| if buffer.is_alias() { buffer.parent } else { handle })
    }

    /// Current state of the native buffer, read through the parent for aliases
    pub fn buffer_state(&self, handle: BufferHandle) -> Option<ResourceState> {
        let owner = self.buffer_state_owner(handle)?;
        self.get_buffer(owner).map(|buffer| buffer.state)
    }

    /// Record a barrier moving a buffer to `new_state`
    ///
    /// Aliases transition their parent's buffer as a whole. Returns false
    /// (and records nothing) for an invalid handle.
    pub fn transition_buffer(&mut self, cmd: &mut CommandBuffer, handle: BufferHandle, new_state: ResourceState) -> bool {
        let Some(owner) = self.buffer_state_owner(handle) else {
            engine_warn!("orbit::ResourceManager", "transition_buffer: invalid handle {}", handle.index);
            return false;
        };
        let Some(buffer) = self.buffers.access_mut(owner.index) else {
            engine_warn!(
                "orbit::ResourceManager",
                "transition_buffer: alias {} outlived its parent {}",
                handle.index,
                owner.index
            );
            return false;
        };
        if needs_barrier(buffer.state, new_state) {
            let masks = barrier_for(buffer.state, new_state);
            cmd.pipeline_barrier(
                &[BufferBarrier {
                    buffer: buffer.raw,
                    src_stages: masks.src_stages,
                    dst_stages: masks.dst_stages,
                    src_access: masks.src_access,
                    dst_access: masks.dst_access,
                }],
                &[],
            );
        }
        buffer.state = new_state;
        true
    }

    // ===== TEXTURES =====

    fn create_native_texture(&self, desc: &TextureDesc, name: &str) -> Result<(RawImage, RawImageView)> {
        let image = log_native_failure("image", name, self.device.create_image(desc, name))?;
        match self
            .device
            .create_image_view(image, desc, &TextureViewDesc::full(desc))
        {
            Ok(view) => Ok((image, view)),
            Err(e) => {
                self.device.destroy_image(image);
                log_native_failure("image view", name, Err(e))
            }
        }
    }

    /// Create a texture, uploading mip 0 of every layer from `initial_data`
    ///
    /// Uploads run on the graphics queue and leave the texture in the
    /// shader-resource state.
    pub fn create_texture(&mut self, mut creation: TextureCreation) -> Result<TextureHandle> {
        if self.textures.is_full() {
            return Err(Self::out_of_slots(&self.textures, &creation.name));
        }

        let initial_data = creation.initial_data.take();
        if let Some(data) = &initial_data {
            let expected = texture_upload_size(&creation.desc);
            if data.len() as u64 != expected {
                return Err(Error::InvalidResource(format!(
                    "texture '{}': initial data is {} bytes, expected {}",
                    creation.name,
                    data.len(),
                    expected
                )));
            }
            creation.desc.usage |= TextureUsage::TRANSFER_DST;
        }

        let (raw_image, raw_view) = self.create_native_texture(&creation.desc, &creation.name)?;

        let mut state = ResourceState::UNDEFINED;
        if let Some(data) = &initial_data {
            if let Err(e) = self.upload_texture(raw_image, &creation.desc, data) {
                self.device.destroy_image_view(raw_view);
                self.device.destroy_image(raw_image);
                return Err(e);
            }
            state = ResourceState::SHADER_RESOURCE;
        }

        let index = self.textures.obtain(Texture {
            raw_image,
            raw_view,
            desc: creation.desc,
            view: TextureViewDesc::full(&creation.desc),
            state,
            parent: TextureHandle::INVALID,
            name: creation.name.clone(),
            pool_index: u32::MAX,
        })?;

        engine_debug!(
            "orbit::ResourceManager",
            "Created texture '{}' (slot {}, {}x{} {:?})",
            creation.name,
            index,
            creation.desc.width,
            creation.desc.height,
            creation.desc.format
        );
        self.texture_creations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, TextureCreationInfo::Texture(creation));

        Ok(TextureHandle::new(index))
    }

    fn upload_texture(&self, image: RawImage, desc: &TextureDesc, data: &[u8]) -> Result<()> {
        let staging = self.device.create_buffer(
            &BufferDesc {
                size: data.len() as u64,
                usage: BufferUsage::TRANSFER_SRC,
                memory: MemoryUsage::CpuToGpu,
            },
            "staging",
        )?;
        let is_depth = desc.format.is_depth();
        let result = self.device.write_buffer(staging, 0, data).and_then(|_| {
            self.immediate.submit(QueueType::Graphics, |cmd| {
                cmd.pipeline_barrier(
                    &[],
                    &[image_barrier(image, is_depth, ResourceState::UNDEFINED, ResourceState::COPY_DEST)],
                );
                cmd.copy_buffer_to_image(
                    staging,
                    image,
                    is_depth,
                    &BufferImageCopy {
                        buffer_offset: 0,
                        width: desc.width,
                        height: desc.height,
                        depth: desc.depth,
                        layer_count: desc.array_layers,
                    },
                );
                cmd.pipeline_barrier(
                    &[],
                    &[image_barrier(
                        image,
                        is_depth,
                        ResourceState::COPY_DEST,
                        ResourceState::SHADER_RESOURCE,
                    )],
                );
                Ok(())
            })
        });
        self.device.destroy_buffer(staging);
        result
    }

    /// Create a view of a subresource range of a live texture
    ///
    /// The view shares its parent's image and holds a non-owning reference
    /// to it.
    pub fn create_texture_view(&mut self, creation: TextureViewCreation) -> Result<TextureHandle> {
        if self.textures.is_full() {
            return Err(Self::out_of_slots(&self.textures, &creation.name));
        }
        if !self.is_live_texture(creation.parent) {
            return Err(Error::InvalidResource(format!(
                "texture view '{}': parent {} is not a live texture",
                creation.name, creation.parent.index
            )));
        }
        let parent = self.get_texture(creation.parent).ok_or_else(|| {
            Error::InvalidResource(format!("texture view '{}': parent missing", creation.name))
        })?;
        if parent.is_view() {
            return Err(Error::InvalidResource(format!(
                "texture view '{}': parent '{}' is itself a view",
                creation.name, parent.name
            )));
        }

        let view = creation.view;
        let desc = parent.desc;
        if view.mip_count == 0
            || view.layer_count == 0
            || view.base_mip + view.mip_count > desc.mip_levels
            || view.base_layer + view.layer_count > desc.array_layers
        {
            return Err(Error::InvalidResource(format!(
                "texture view '{}': range {:?} outside parent '{}' ({} mips, {} layers)",
                creation.name, view, parent.name, desc.mip_levels, desc.array_layers
            )));
        }

        let raw_image = parent.raw_image;
        let raw_view = log_native_failure(
            "texture view",
            &creation.name,
            self.device.create_image_view(raw_image, &desc, &view),
        )?;

        let index = self.textures.obtain(Texture {
            raw_image,
            raw_view,
            desc,
            view,
            state: ResourceState::UNDEFINED,
            parent: creation.parent,
            name: creation.name.clone(),
            pool_index: u32::MAX,
        })?;

        self.texture_creations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, TextureCreationInfo::View(creation));

        Ok(TextureHandle::new(index))
    }

    /// Texture or view record, or `None` for an invalid or freed handle
    pub fn get_texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.access(handle.index)
    }

    /// Schedule a texture or view for destruction once in-flight frames complete
    ///
    /// # Panics
    ///
    /// Panics if the texture was already destroyed.
    pub fn destroy_texture(&self, handle: TextureHandle) {
        if self.textures.access(handle.index).is_none() {
            engine_warn!("orbit::ResourceManager", "destroy_texture: invalid handle {}", handle.index);
            return;
        }

        let (removed, live_views) = {
            let mut creations = self.texture_creations.lock().unwrap_or_else(PoisonError::into_inner);
            let removed = creations.remove(&handle.index);
            let live_views = creations
                .values()
                .filter(|info| matches!(info, TextureCreationInfo::View(view) if view.parent == handle))
                .count();
            (removed, live_views)
        };
        assert!(removed.is_some(), "ResourceManager: texture {} destroyed twice", handle.index);

        if live_views > 0 {
            engine_warn!(
                "orbit::ResourceManager",
                "Texture {} destroyed while {} view(s) of it are still live",
                handle.index,
                live_views
            );
        }

        self.deletion_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .enqueue(PendingDeletion::Texture(handle), self.current_frame);
    }

    /// Rebuild a texture's native image at a new size, keeping its handle
    ///
    /// The previous image and view are retired through the deletion queue,
    /// so in-flight frames can keep sampling them. The new image starts in
    /// the undefined state.
    pub fn resize_texture(&mut self, handle: TextureHandle, width: u32, height: u32) -> Result<()> {
        let (name, desc) = {
            let creations = self.texture_creations.get_mut().unwrap_or_else(PoisonError::into_inner);
            let creation = match creations.get(&handle.index) {
                Some(TextureCreationInfo::Texture(creation)) => creation,
                Some(TextureCreationInfo::View(view)) => {
                    return Err(Error::InvalidResource(format!(
                        "resize_texture: '{}' is a view",
                        view.name
                    )))
                }
                None => {
                    return Err(Error::InvalidResource(format!(
                        "resize_texture: {} is not a live texture",
                        handle.index
                    )))
                }
            };
            let has_views = creations
                .values()
                .any(|info| matches!(info, TextureCreationInfo::View(view) if view.parent == handle));
            if has_views {
                return Err(Error::InvalidResource(format!(
                    "resize_texture: '{}' has live views",
                    creation.name
                )));
            }
            (creation.name.clone(), creation.desc)
        };

        if desc.width == width && desc.height == height {
            return Ok(());
        }

        let new_desc = TextureDesc { width, height, ..desc };
        let (image, view) = self.create_native_texture(&new_desc, &name)?;

        let Some(texture) = self.textures.access_mut(handle.index) else {
            self.device.destroy_image_view(view);
            self.device.destroy_image(image);
            return Err(Error::InvalidResource(format!("resize_texture: slot {} is empty", handle.index)));
        };
        let old_image = std::mem::replace(&mut texture.raw_image, image);
        let old_view = std::mem::replace(&mut texture.raw_view, view);
        texture.desc = new_desc;
        texture.view = TextureViewDesc::full(&new_desc);
        texture.state = ResourceState::UNDEFINED;

        self.deletion_queue
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .enqueue(
                PendingDeletion::RetiredImage {
                    image: old_image,
                    view: old_view,
                },
                self.current_frame,
            );
        if let Some(TextureCreationInfo::Texture(creation)) = self
            .texture_creations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&handle.index)
        {
            creation.desc = new_desc;
        }

        engine_info!(
            "orbit::ResourceManager",
            "Resized texture '{}' {}x{} -> {}x{}",
            name,
            desc.width,
            desc.height,
            width,
            height
        );
        Ok(())
    }

    // Record holding the state of the native image behind `handle`
    fn texture_state_owner(&self, handle: TextureHandle) -> Option<TextureHandle> {
        self.get_texture(handle)
            .map(|texture| if texture.is_view() { texture.parent } else { handle })
    }

    /// Current state of the native image, read through the parent for views
    pub fn texture_state(&self, handle: TextureHandle) -> Option<ResourceState> {
        let owner = self.texture_state_owner(handle)?;
        self.get_texture(owner).map(|texture| texture.state)
    }

    /// Record a barrier moving a texture to `new_state`
    ///
    /// Barriers cover the whole image, so a view transitions its parent's
    /// image and updates the parent's state. Returns false (and records
    /// nothing) for an invalid handle.
    pub fn transition_texture(
        &mut self,
        cmd: &mut CommandBuffer,
        handle: TextureHandle,
        new_state: ResourceState,
    ) -> bool {
        let Some(owner) = self.texture_state_owner(handle) else {
            engine_warn!("orbit::ResourceManager", "transition_texture: invalid handle {}", handle.index);
            return false;
        };
        let Some(texture) = self.textures.access_mut(owner.index) else {
            engine_warn!(
                "orbit::ResourceManager",
                "transition_texture: view {} outlived its parent {}",
                handle.index,
                owner.index
            );
            return false;
        };
        if needs_barrier(texture.state, new_state) {
            cmd.pipeline_barrier(
                &[],
                &[image_barrier(
                    texture.raw_image,
                    texture.desc.format.is_depth(),
                    texture.state,
                    new_state,
                )],
            );
        }
        texture.state = new_state;
        true
    }

    // ===== SAMPLERS =====

    pub fn create_sampler(&mut self, creation: SamplerCreation) -> Result<SamplerHandle> {
        if self.samplers.is_full() {
            return Err(Self::out_of_slots(&self.samplers, &creation.name));
        }

        let raw = log_native_failure("sampler", &creation.name, self.device.create_sampler(&creation.desc))?;
        let index = self.samplers.obtain(Sampler {
            raw,
            desc: creation.desc,
            name: creation.name.clone(),
            pool_index: u32::MAX,
        })?;

        self.sampler_creations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, creation);

        Ok(SamplerHandle::new(index))
    }

    pub fn get_sampler(&self, handle: SamplerHandle) -> Option<&Sampler> {
        self.samplers.access(handle.index)
    }

    /// Schedule a sampler for destruction once in-flight frames complete
    ///
    /// # Panics
    ///
    /// Panics if the sampler was already destroyed.
    pub fn destroy_sampler(&self, handle: SamplerHandle) {
        if self.samplers.access(handle.index).is_none() {
            engine_warn!("orbit::ResourceManager", "destroy_sampler: invalid handle {}", handle.index);
            return;
        }

        let removed = self
            .sampler_creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.index);
        assert!(removed.is_some(), "ResourceManager: sampler {} destroyed twice", handle.index);

        self.deletion_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .enqueue(PendingDeletion::Sampler(handle), self.current_frame);
    }

    // ===== DELETION =====

    /// Free every destroyed resource whose grace period has elapsed
    ///
    /// Called once per frame by the frame driver, after the frame slot's
    /// fence wait and command pool reset. Returns the number of entries freed.
    pub fn process_pending_deletions(&mut self) -> usize {
        let ready = self
            .deletion_queue
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain_ready(self.current_frame, self.frames_in_flight);
        self.free_entries(ready)
    }

    // Views and aliases go before the objects they borrow from
    fn deletion_order(&self, resource: &PendingDeletion) -> u8 {
        match resource {
            PendingDeletion::Buffer(handle) => {
                if self.buffers.access(handle.index).is_some_and(Buffer::is_alias) {
                    0
                } else {
                    1
                }
            }
            PendingDeletion::Texture(handle) => {
                if self.textures.access(handle.index).is_some_and(Texture::is_view) {
                    0
                } else {
                    1
                }
            }
            PendingDeletion::RetiredImage { .. } => 1,
            PendingDeletion::Sampler(_) => 2,
        }
    }

    fn free_entries(&mut self, mut entries: Vec<DeletionEntry>) -> usize {
        entries.sort_by_key(|entry| self.deletion_order(&entry.resource));
        let count = entries.len();
        for entry in entries {
            self.free_now(entry.resource);
        }
        if count > 0 {
            engine_debug!(
                "orbit::ResourceManager",
                "Freed {} resource(s) at frame {}",
                count,
                self.current_frame
            );
        }
        count
    }

    fn free_now(&mut self, resource: PendingDeletion) {
        match resource {
            PendingDeletion::Buffer(handle) => {
                let buffer = self.buffers.release(handle.index);
                if !buffer.is_alias() {
                    self.device.destroy_buffer(buffer.raw);
                }
            }
            PendingDeletion::Texture(handle) => {
                let texture = self.textures.release(handle.index);
                self.device.destroy_image_view(texture.raw_view);
                if !texture.is_view() {
                    self.device.destroy_image(texture.raw_image);
                }
            }
            PendingDeletion::Sampler(handle) => {
                let sampler = self.samplers.release(handle.index);
                self.device.destroy_sampler(sampler.raw);
            }
            PendingDeletion::RetiredImage { image, view } => {
                self.device.destroy_image_view(view);
                self.device.destroy_image(image);
            }
        }
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            samplers: self.samplers.len(),
            pending_deletions: self
                .deletion_queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            current_frame: self.current_frame,
        }
    }

    // ===== SHUTDOWN =====

    /// Wait for the GPU, free everything pending and report leaks
    ///
    /// Resources that were never destroyed are logged at ERROR and freed.
    /// Returns the number of leaked resources. Calling it twice is a no-op.
    pub fn shutdown(&mut self) -> Result<u32> {
        if self.is_shut_down {
            return Ok(0);
        }
        self.is_shut_down = true;

        self.device.wait_idle()?;

        let pending = self
            .deletion_queue
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain_all();
        self.free_entries(pending);

        let mut leaked = 0u32;

        let (views, images): (Vec<_>, Vec<_>) =
            self.textures.shutdown().into_iter().partition(|(_, t)| t.is_view());
        for (index, texture) in views.into_iter().chain(images) {
            engine_error!("orbit::ResourceManager", "Leaked texture '{}' (slot {})", texture.name, index);
            self.device.destroy_image_view(texture.raw_view);
            if !texture.is_view() {
                self.device.destroy_image(texture.raw_image);
            }
            leaked += 1;
        }

        let (aliases, owners): (Vec<_>, Vec<_>) =
            self.buffers.shutdown().into_iter().partition(|(_, b)| b.is_alias());
        for (index, buffer) in aliases.into_iter().chain(owners) {
            engine_error!("orbit::ResourceManager", "Leaked buffer '{}' (slot {})", buffer.name, index);
            if !buffer.is_alias() {
                self.device.destroy_buffer(buffer.raw);
            }
            leaked += 1;
        }

        for (index, sampler) in self.samplers.shutdown() {
            engine_error!("orbit::ResourceManager", "Leaked sampler '{}' (slot {})", sampler.name, index);
            self.device.destroy_sampler(sampler.raw);
            leaked += 1;
        }

        self.buffer_creations.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        self.texture_creations.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        self.sampler_creations.get_mut().unwrap_or_else(PoisonError::into_inner).clear();

        engine_info!("orbit::ResourceManager", "Shut down ({} leaked resource(s))", leaked);
        Ok(leaked)
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            engine_error!("orbit::ResourceManager", "Shutdown on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;

//! Shader effects and the descriptor binding cache
//!
//! A [`ShaderEffect`] is the immutable part of a compiled shader: its binding
//! table, one descriptor set layout per set and the pipeline layout built
//! from them. It is shared between recording threads behind an `Arc`.
//!
//! A [`ShaderEffectBinder`] is the mutable part, owned by exactly one
//! recording thread. Resources are bound by name; the binder keeps the full
//! list of writes per set and only rebuilds a set when one of its writes
//! changed or when its cached descriptor set came from a pool that has been
//! reset since. Descriptor churn is therefore proportional to binding
//! changes, not to draw calls.

use crate::command::CommandBuffer;
use crate::descriptor::{
    BindingTable, BindlessTable, DescriptorAllocator, BINDLESS_SET_INDEX, MAX_DESCRIPTOR_SETS,
};
use crate::error::{Error, Result};
use crate::gpu_device::{
    DescriptorResource, DescriptorSetLayoutBinding, DescriptorType, DescriptorUpdate, GpuDevice,
    ImageLayout, PipelineBindPoint, RawBuffer, RawDescriptorSet, RawDescriptorSetLayout,
    RawImageView, RawPipelineLayout, RawSampler,
};
use crate::resource::{Buffer, Sampler, Texture};
use crate::{engine_debug, engine_warn};
use bitflags::bitflags;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SET_COUNT: usize = MAX_DESCRIPTOR_SETS as usize;

// ============================================================================
// Binding descriptions
// ============================================================================

/// Buffer range bound to a buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    pub buffer: RawBuffer,
    pub offset: u64,
    pub range: u64,
}

impl BufferBinding {
    /// Whole buffer; aliases resolve to their range inside the parent
    pub fn from_buffer(buffer: &Buffer) -> Self {
        Self {
            buffer: buffer.raw,
            offset: buffer.global_offset,
            range: buffer.size,
        }
    }
}

/// Image view (and sampler) bound to an image descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBinding {
    pub view: RawImageView,
    pub sampler: Option<RawSampler>,
    pub layout: ImageLayout,
}

impl ImageBinding {
    /// Texture sampled from a shader
    pub fn sampled(texture: &Texture, sampler: Option<&Sampler>) -> Self {
        Self {
            view: texture.raw_view,
            sampler: sampler.map(|s| s.raw),
            layout: ImageLayout::ShaderReadOnly,
        }
    }

    /// Texture written as a storage image
    pub fn storage(texture: &Texture) -> Self {
        Self {
            view: texture.raw_view,
            sampler: None,
            layout: ImageLayout::General,
        }
    }
}

// ============================================================================
// ShaderEffect
// ============================================================================

pub struct ShaderEffect {
    device: Arc<dyn GpuDevice>,
    name: String,
    table: BindingTable,
    set_layouts: Vec<RawDescriptorSetLayout>,
    /// Layouts created (and destroyed) by this effect; the bindless layout is borrowed
    owned_layouts: Vec<RawDescriptorSetLayout>,
    pipeline_layout: RawPipelineLayout,
    bind_point: PipelineBindPoint,
}

impl ShaderEffect {
    /// Build the descriptor set layouts and pipeline layout of an effect
    ///
    /// When a bindless table is given, its layout occupies the bindless set
    /// index so the global set stays compatible with this pipeline layout.
    /// Sets the table does not use get empty layouts.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        name: impl Into<String>,
        table: BindingTable,
        bindless: Option<&BindlessTable>,
        push_constant_size: u32,
        bind_point: PipelineBindPoint,
    ) -> Result<Self> {
        let name = name.into();
        let uses_bindless_set = table.set_count() > BINDLESS_SET_INDEX;
        if uses_bindless_set && bindless.is_none() {
            return Err(Error::InitializationFailed(format!(
                "shader effect '{}' declares bindings in set {} but no bindless table was given",
                name, BINDLESS_SET_INDEX
            )));
        }

        let layout_count = match bindless {
            Some(_) => MAX_DESCRIPTOR_SETS,
            None => table.set_count(),
        };

        let mut effect = Self {
            device: Arc::clone(&device),
            name,
            table,
            set_layouts: Vec::with_capacity(layout_count as usize),
            owned_layouts: Vec::new(),
            pipeline_layout: RawPipelineLayout::NULL,
            bind_point,
        };

        // Partially built layouts are released by Drop on early return
        for set in 0..layout_count {
            let layout = match bindless {
                Some(bindless) if set == BINDLESS_SET_INDEX => bindless.layout(),
                _ => {
                    let bindings: Vec<DescriptorSetLayoutBinding> = effect
                        .table
                        .entries_for_set(set)
                        .into_iter()
                        .map(|entry| DescriptorSetLayoutBinding {
                            binding: entry.binding,
                            descriptor_type: entry.descriptor_type,
                            count: entry.count,
                            stages: entry.stages,
                            partially_bound: false,
                        })
                        .collect();
                    let layout = device.create_descriptor_set_layout(&bindings, false)?;
                    effect.owned_layouts.push(layout);
                    layout
                }
            };
            effect.set_layouts.push(layout);
        }

        effect.pipeline_layout = device.create_pipeline_layout(&effect.set_layouts, push_constant_size)?;

        engine_debug!(
            "orbit::ShaderEffect",
            "Shader effect '{}' created: {} bindings over {} sets",
            effect.name,
            effect.table.len(),
            effect.set_layouts.len()
        );

        Ok(effect)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding_table(&self) -> &BindingTable {
        &self.table
    }

    /// Layout of `set`, `NULL` past the last set of the pipeline layout
    pub fn set_layout(&self, set: u32) -> RawDescriptorSetLayout {
        self.set_layouts
            .get(set as usize)
            .copied()
            .unwrap_or(RawDescriptorSetLayout::NULL)
    }

    pub fn pipeline_layout(&self) -> RawPipelineLayout {
        self.pipeline_layout
    }

    pub fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for ShaderEffect {
    fn drop(&mut self) {
        if !self.pipeline_layout.is_null() {
            self.device.destroy_pipeline_layout(self.pipeline_layout);
        }
        for layout in self.owned_layouts.drain(..) {
            self.device.destroy_descriptor_set_layout(layout);
        }
    }
}

// ============================================================================
// ShaderEffectBinder
// ============================================================================

bitflags! {
    /// Descriptor sets whose writes changed since they were last built
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtySets: u8 {
        const SET_0 = 1 << 0;
        const SET_1 = 1 << 1;
        const SET_2 = 1 << 2;
        const SET_3 = 1 << 3;
    }
}

impl DirtySets {
    pub fn for_set(set: u32) -> Self {
        Self::from_bits_truncate(1 << set)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    set: u32,
    binding: u32,
    descriptor_type: DescriptorType,
    resource: DescriptorResource,
    dynamic_offset: Option<u32>,
}

/// Descriptor set built by a binder, tagged with the allocator state it came from
#[derive(Debug, Clone)]
struct CachedSet {
    set: RawDescriptorSet,
    allocator_id: u64,
    epoch: u64,
    allocator_epoch: Option<Arc<AtomicU64>>,
}

impl CachedSet {
    const EMPTY: Self = Self {
        set: RawDescriptorSet::NULL,
        allocator_id: 0,
        epoch: 0,
        allocator_epoch: None,
    };

    fn is_valid_for(&self, allocator: &DescriptorAllocator) -> bool {
        !self.set.is_null() && self.allocator_id == allocator.id() && self.epoch == allocator.epoch()
    }

    // False once the pool the set came from has been reset
    fn is_current(&self) -> bool {
        self.allocator_epoch
            .as_ref()
            .is_some_and(|counter| counter.load(Ordering::Relaxed) == self.epoch)
    }
}

fn empty_cache() -> [CachedSet; SET_COUNT] {
    std::array::from_fn(|_| CachedSet::EMPTY)
}

/// Per-thread binding state of a [`ShaderEffect`]
pub struct ShaderEffectBinder {
    effect: Arc<ShaderEffect>,
    writes: Vec<PendingWrite>,
    cached: [CachedSet; SET_COUNT],
    dirty: DirtySets,
}

impl ShaderEffectBinder {
    pub fn new(effect: Arc<ShaderEffect>) -> Self {
        Self {
            effect,
            writes: Vec::new(),
            cached: empty_cache(),
            dirty: DirtySets::empty(),
        }
    }

    pub fn effect(&self) -> &Arc<ShaderEffect> {
        &self.effect
    }

    pub fn dirty_sets(&self) -> DirtySets {
        self.dirty
    }

    /// Descriptor set currently cached for `set` (`NULL` when not built)
    pub fn cached_set(&self, set: u32) -> RawDescriptorSet {
        self.cached
            .get(set as usize)
            .map_or(RawDescriptorSet::NULL, |cached| cached.set)
    }

    /// Bind a uniform or storage buffer by name
    ///
    /// Returns false (with a warning) when the name is unknown or the
    /// binding is not a non-dynamic buffer.
    pub fn bind_buffer(&mut self, name: &str, binding: BufferBinding) -> bool {
        self.bind(
            name,
            |ty| ty.is_buffer() && !ty.is_dynamic(),
            Self::buffer_resource(binding),
            None,
        )
    }

    /// Bind a dynamic uniform or storage buffer by name
    ///
    /// Only the resource identity is part of the cached set; changing just
    /// the dynamic offset never rebuilds the set.
    pub fn bind_dynamic_buffer(&mut self, name: &str, binding: BufferBinding, dynamic_offset: u32) -> bool {
        self.bind(
            name,
            |ty| ty.is_dynamic(),
            Self::buffer_resource(binding),
            Some(dynamic_offset),
        )
    }

    /// Bind a sampled, storage or combined image (or a bare sampler) by name
    pub fn bind_image(&mut self, name: &str, binding: ImageBinding) -> bool {
        let needs_sampler = self
            .effect
            .table
            .lookup(name)
            .is_some_and(|entry| {
                matches!(
                    entry.descriptor_type,
                    DescriptorType::CombinedImageSampler | DescriptorType::Sampler
                )
            });
        if needs_sampler && binding.sampler.is_none() {
            engine_warn!(
                "orbit::ShaderEffect",
                "'{}': binding '{}' needs a sampler",
                self.effect.name,
                name
            );
            return false;
        }

        self.bind(
            name,
            |ty| !ty.is_buffer(),
            DescriptorResource::Image {
                view: binding.view,
                sampler: binding.sampler,
                layout: binding.layout,
            },
            None,
        )
    }

    fn buffer_resource(binding: BufferBinding) -> DescriptorResource {
        DescriptorResource::Buffer {
            buffer: binding.buffer,
            offset: binding.offset,
            range: binding.range,
        }
    }

    fn bind(
        &mut self,
        name: &str,
        accepts: impl Fn(DescriptorType) -> bool,
        resource: DescriptorResource,
        dynamic_offset: Option<u32>,
    ) -> bool {
        let Some(entry) = self.effect.table.lookup(name) else {
            engine_warn!(
                "orbit::ShaderEffect",
                "'{}': no binding named '{}'",
                self.effect.name,
                name
            );
            return false;
        };
        if entry.set == BINDLESS_SET_INDEX {
            engine_warn!(
                "orbit::ShaderEffect",
                "'{}': binding '{}' lives in the bindless set and is bound globally",
                self.effect.name,
                name
            );
            return false;
        }
        if !accepts(entry.descriptor_type) {
            engine_warn!(
                "orbit::ShaderEffect",
                "'{}': binding '{}' is {:?}, which does not accept this resource",
                self.effect.name,
                name,
                entry.descriptor_type
            );
            return false;
        }

        let (set, binding, descriptor_type) = (entry.set, entry.binding, entry.descriptor_type);
        match self
            .writes
            .iter_mut()
            .find(|w| w.set == set && w.binding == binding)
        {
            Some(write) => {
                if write.resource != resource {
                    write.resource = resource;
                    self.dirty |= DirtySets::for_set(set);
                }
                write.dynamic_offset = dynamic_offset;
            }
            None => {
                self.writes.push(PendingWrite {
                    set,
                    binding,
                    descriptor_type,
                    resource,
                    dynamic_offset,
                });
                self.dirty |= DirtySets::for_set(set);
            }
        }
        true
    }

    /// Allocate and write every set that changed or whose cached set is gone
    ///
    /// Sets without writes and the bindless set are skipped. Each rebuilt
    /// set is written with one batched update. Returns the number of sets
    /// allocated.
    pub fn build_sets(&mut self, allocator: &mut DescriptorAllocator) -> Result<u32> {
        let mut allocated = 0;

        for set in 0..self.effect.table.set_count() {
            if set == BINDLESS_SET_INDEX {
                continue;
            }
            let flag = DirtySets::for_set(set);
            let cached = &self.cached[set as usize];
            if !self.dirty.contains(flag) && cached.is_valid_for(allocator) {
                continue;
            }

            let updates_template: Vec<PendingWrite> =
                self.writes.iter().filter(|w| w.set == set).copied().collect();
            if updates_template.is_empty() {
                continue;
            }

            let raw_set = allocator.allocate(self.effect.set_layouts[set as usize])?;
            let updates: Vec<DescriptorUpdate> = updates_template
                .iter()
                .map(|w| DescriptorUpdate {
                    set: raw_set,
                    binding: w.binding,
                    array_element: 0,
                    descriptor_type: w.descriptor_type,
                    resource: w.resource,
                })
                .collect();
            self.effect.device.update_descriptor_sets(&updates);

            self.cached[set as usize] = CachedSet {
                set: raw_set,
                allocator_id: allocator.id(),
                epoch: allocator.epoch(),
                allocator_epoch: Some(allocator.epoch_counter()),
            };
            self.dirty.remove(flag);
            allocated += 1;
        }

        Ok(allocated)
    }

    /// Bind every built set, each with its dynamic offsets in binding order
    ///
    /// # Panics
    ///
    /// Panics if a bind changed since `build_sets()`, or if a built set's
    /// descriptor pool was reset since (a frame boundary without a rebuild).
    pub fn apply_binds(&self, command_buffer: &mut CommandBuffer) {
        assert!(
            self.dirty.is_empty(),
            "'{}': apply_binds() with unbuilt changes ({:?}), call build_sets() first",
            self.effect.name,
            self.dirty
        );

        for set in 0..self.effect.table.set_count() {
            if set == BINDLESS_SET_INDEX {
                continue;
            }
            let cached = &self.cached[set as usize];
            let raw_set = cached.set;
            if raw_set.is_null() {
                continue;
            }
            assert!(
                cached.is_current(),
                "'{}': set {} was allocated before its descriptor pool was reset, call build_sets() first",
                self.effect.name,
                set
            );

            let mut dynamic: Vec<(u32, u32)> = self
                .writes
                .iter()
                .filter(|w| w.set == set)
                .filter_map(|w| w.dynamic_offset.map(|offset| (w.binding, offset)))
                .collect();
            dynamic.sort_by_key(|&(binding, _)| binding);
            let offsets: Vec<u32> = dynamic.into_iter().map(|(_, offset)| offset).collect();

            command_buffer.bind_descriptor_sets(
                self.effect.bind_point,
                self.effect.pipeline_layout,
                set,
                &[raw_set],
                &offsets,
            );
        }
    }

    /// Forget all writes and cached sets
    pub fn clear(&mut self) {
        self.writes.clear();
        self.cached = empty_cache();
        self.dirty = DirtySets::empty();
    }
}

#[cfg(test)]
#[path = "shader_effect_tests.rs"]
mod tests;

use crate::command::CommandBuffer;
use crate::descriptor::{ShaderEffect, BINDLESS_SET_INDEX};
use crate::error::Result;
use crate::gpu_device::{
    DescriptorPoolDesc, DescriptorResource, DescriptorSetLayoutBinding, DescriptorType,
    DescriptorUpdate, GpuDevice, ImageLayout, RawDescriptorPool, RawDescriptorSet,
    RawDescriptorSetLayout, RawImageView, RawSampler, ShaderStageFlags,
};
use crate::resource::{Sampler, Texture};
use crate::{engine_err, engine_info, engine_warn};
use std::sync::Arc;

/// Binding index of the sampled image array inside the bindless set
pub const BINDLESS_TEXTURE_BINDING: u32 = 0;

/// Append-only global array of sampled images
///
/// The single descriptor set lives for the whole session and is bound once
/// per command buffer at [`BINDLESS_SET_INDEX`]. Slots are never recycled.
pub struct BindlessTable {
    device: Arc<dyn GpuDevice>,
    pool: RawDescriptorPool,
    layout: RawDescriptorSetLayout,
    set: RawDescriptorSet,
    capacity: u32,
    next_index: u32,
}

impl BindlessTable {
    pub fn new(device: Arc<dyn GpuDevice>, capacity: u32) -> Result<Self> {
        let layout = device.create_descriptor_set_layout(
            &[DescriptorSetLayoutBinding {
                binding: BINDLESS_TEXTURE_BINDING,
                descriptor_type: DescriptorType::CombinedImageSampler,
                count: capacity,
                stages: ShaderStageFlags::ALL_GRAPHICS | ShaderStageFlags::COMPUTE,
                partially_bound: true,
            }],
            true,
        )?;

        let pool = match device.create_descriptor_pool(&DescriptorPoolDesc {
            max_sets: 1,
            sizes: vec![(DescriptorType::CombinedImageSampler, capacity)],
            update_after_bind: true,
        }) {
            Ok(pool) => pool,
            Err(e) => {
                device.destroy_descriptor_set_layout(layout);
                return Err(e);
            }
        };

        let set = match device.allocate_descriptor_set(pool, layout) {
            Ok(Some(set)) => set,
            result => {
                device.destroy_descriptor_pool(pool);
                device.destroy_descriptor_set_layout(layout);
                return Err(match result {
                    Err(e) => e,
                    Ok(_) => engine_err!("orbit::BindlessTable", "Bindless descriptor set allocation failed"),
                });
            }
        };

        engine_info!("orbit::BindlessTable", "Bindless table created ({} sampled images)", capacity);

        Ok(Self {
            device,
            pool,
            layout,
            set,
            capacity,
            next_index: 0,
        })
    }

    /// Write a sampled image into the next free slot and return its index
    ///
    /// Returns `None` with a warning once the table is full; callers are
    /// expected to fall back to a default texture.
    pub fn add_sampled_image(&mut self, view: RawImageView, sampler: RawSampler) -> Option<u32> {
        if self.next_index >= self.capacity {
            engine_warn!(
                "orbit::BindlessTable",
                "Bindless table full ({} entries), image not added",
                self.capacity
            );
            return None;
        }

        let index = self.next_index;
        self.device.update_descriptor_sets(&[DescriptorUpdate {
            set: self.set,
            binding: BINDLESS_TEXTURE_BINDING,
            array_element: index,
            descriptor_type: DescriptorType::CombinedImageSampler,
            resource: DescriptorResource::Image {
                view,
                sampler: Some(sampler),
                layout: ImageLayout::ShaderReadOnly,
            },
        }]);
        self.next_index += 1;
        Some(index)
    }

    pub fn add_texture(&mut self, texture: &Texture, sampler: &Sampler) -> Option<u32> {
        self.add_sampled_image(texture.raw_view, sampler.raw)
    }

    /// Bind the global set for pipelines of `effect`
    pub fn bind_global(&self, command_buffer: &mut CommandBuffer, effect: &ShaderEffect) {
        assert_eq!(
            effect.set_layout(BINDLESS_SET_INDEX),
            self.layout,
            "shader effect '{}' was not built against this bindless table",
            effect.name()
        );
        command_buffer.bind_descriptor_sets(
            effect.bind_point(),
            effect.pipeline_layout(),
            BINDLESS_SET_INDEX,
            &[self.set],
            &[],
        );
    }

    pub fn layout(&self) -> RawDescriptorSetLayout {
        self.layout
    }

    pub fn set(&self) -> RawDescriptorSet {
        self.set
    }

    pub fn len(&self) -> u32 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Drop for BindlessTable {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.pool);
        self.device.destroy_descriptor_set_layout(self.layout);
    }
}

#[cfg(test)]
#[path = "bindless_tests.rs"]
mod tests;

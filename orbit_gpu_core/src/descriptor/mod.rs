pub mod binding_table;
pub mod bindless;
pub mod descriptor_allocator;
pub mod shader_effect;

pub use binding_table::{BindingTable, BindingTableEntry, BINDLESS_SET_INDEX, MAX_DESCRIPTOR_SETS};
pub use bindless::{BindlessTable, BINDLESS_TEXTURE_BINDING};
pub use descriptor_allocator::{default_pool_sizes, DescriptorAllocator, DescriptorAllocatorGrid};
pub use shader_effect::{BufferBinding, DirtySets, ImageBinding, ShaderEffect, ShaderEffectBinder};

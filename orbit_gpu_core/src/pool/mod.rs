//! Fixed-capacity slot pools and typed handles

pub mod handle;
pub mod resource_pool;
pub mod slot_pool;

pub use handle::{BufferHandle, SamplerHandle, TextureHandle};
pub use resource_pool::{PoolElement, ResourcePool};
pub use slot_pool::SlotPool;

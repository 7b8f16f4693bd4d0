//! GPU resource records, the resource manager and its deletion queue

pub mod buffer;
pub mod deletion_queue;
pub mod resource_manager;
pub mod sampler;
pub mod texture;

pub use buffer::{Buffer, BufferCreation};
pub use deletion_queue::{DeletionEntry, DeletionQueue, PendingDeletion};
pub use resource_manager::{texture_upload_size, ResourceManager, ResourceStats};
pub use sampler::{Sampler, SamplerCreation};
pub use texture::{Texture, TextureCreation, TextureViewCreation};

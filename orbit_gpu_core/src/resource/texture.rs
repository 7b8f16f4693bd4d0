use crate::gpu_device::{RawImage, RawImageView, ResourceState, TextureDesc, TextureViewDesc};
use crate::pool::{PoolElement, TextureHandle};

/// Parameters for `ResourceManager::create_texture`
#[derive(Debug, Clone)]
pub struct TextureCreation {
    pub name: String,
    pub desc: TextureDesc,
    /// Tightly packed texels for mip 0 of every layer
    pub initial_data: Option<Vec<u8>>,
}

impl TextureCreation {
    pub fn new(name: impl Into<String>, desc: TextureDesc) -> Self {
        Self {
            name: name.into(),
            desc,
            initial_data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.initial_data = Some(data.into());
        self
    }
}

/// Parameters for `ResourceManager::create_texture_view`
#[derive(Debug, Clone)]
pub struct TextureViewCreation {
    pub name: String,
    pub parent: TextureHandle,
    pub view: TextureViewDesc,
}

/// Texture or texture view record held by the resource manager
#[derive(Debug)]
pub struct Texture {
    pub raw_image: RawImage,
    pub raw_view: RawImageView,
    pub desc: TextureDesc,
    pub view: TextureViewDesc,
    /// Image state, tracked on the owning texture only (views stay `UNDEFINED`)
    pub state: ResourceState,
    /// Parent texture for views (non-owning), `INVALID` otherwise
    pub parent: TextureHandle,
    pub name: String,
    pub pool_index: u32,
}

impl Texture {
    pub fn handle(&self) -> TextureHandle {
        TextureHandle::new(self.pool_index)
    }

    /// True if this record only owns an image view of its parent's image
    pub fn is_view(&self) -> bool {
        self.parent.is_valid()
    }
}

impl PoolElement for Texture {
    fn set_pool_index(&mut self, index: u32) {
        self.pool_index = index;
    }
}

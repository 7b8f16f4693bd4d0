use crate::gpu_device::{BufferDesc, BufferUsage, MemoryUsage, RawBuffer, ResourceState};
use crate::pool::{BufferHandle, PoolElement};

/// Parameters for `ResourceManager::create_buffer`
///
/// Kept (without the initial data) for as long as the buffer is live.
#[derive(Debug, Clone)]
pub struct BufferCreation {
    pub name: String,
    pub desc: BufferDesc,
    /// Uploaded once at creation
    pub initial_data: Option<Vec<u8>>,
    /// Alias a byte range of another buffer instead of allocating
    pub alias_of: Option<(BufferHandle, u64)>,
}

impl BufferCreation {
    pub fn new(name: impl Into<String>, size: u64, usage: BufferUsage, memory: MemoryUsage) -> Self {
        Self {
            name: name.into(),
            desc: BufferDesc { size, usage, memory },
            initial_data: None,
            alias_of: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.initial_data = Some(data.into());
        self
    }

    /// Make this buffer a view of `size` bytes of `parent` starting at `offset`
    pub fn alias_of(mut self, parent: BufferHandle, offset: u64) -> Self {
        self.alias_of = Some((parent, offset));
        self
    }
}

/// Buffer record held by the resource manager
#[derive(Debug)]
pub struct Buffer {
    pub raw: RawBuffer,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryUsage,
    /// Buffer state, tracked on the owning buffer only (aliases stay `UNDEFINED`)
    pub state: ResourceState,
    /// Aliased parent, `INVALID` for buffers that own their allocation
    pub parent: BufferHandle,
    /// Byte offset into `raw` (non-zero only for aliases)
    pub global_offset: u64,
    pub name: String,
    pub pool_index: u32,
}

impl Buffer {
    pub fn handle(&self) -> BufferHandle {
        BufferHandle::new(self.pool_index)
    }

    /// True if this buffer borrows its parent's native allocation
    pub fn is_alias(&self) -> bool {
        self.parent.is_valid()
    }
}

impl PoolElement for Buffer {
    fn set_pool_index(&mut self, index: u32) {
        self.pool_index = index;
    }
}

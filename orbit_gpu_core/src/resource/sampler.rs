use crate::gpu_device::{RawSampler, SamplerDesc};
use crate::pool::{PoolElement, SamplerHandle};

#[derive(Debug, Clone)]
pub struct SamplerCreation {
    pub name: String,
    pub desc: SamplerDesc,
}

impl SamplerCreation {
    pub fn new(name: impl Into<String>, desc: SamplerDesc) -> Self {
        Self {
            name: name.into(),
            desc,
        }
    }
}

#[derive(Debug)]
pub struct Sampler {
    pub raw: RawSampler,
    pub desc: SamplerDesc,
    pub name: String,
    pub pool_index: u32,
}

impl Sampler {
    pub fn handle(&self) -> SamplerHandle {
        SamplerHandle::new(self.pool_index)
    }
}

impl PoolElement for Sampler {
    fn set_pool_index(&mut self, index: u32) {
        self.pool_index = index;
    }
}

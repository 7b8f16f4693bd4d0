//! Core configuration
//!
//! Sizes every fixed-capacity structure at init time. Nothing grows at
//! runtime except the descriptor pool list.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Configuration for the GPU core
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Frame-in-flight depth (N)
    pub frames_in_flight: u32,
    /// Number of recording threads (command pool grid width)
    pub num_threads: u32,
    /// Buffer pool capacity
    pub max_buffers: u32,
    /// Texture pool capacity (textures and views share one pool)
    pub max_textures: u32,
    /// Sampler pool capacity
    pub max_samplers: u32,
    /// Number of entries in the bindless sampled-image array
    pub bindless_capacity: u32,
    /// Descriptor sets per native descriptor pool
    pub descriptor_pool_max_sets: u32,
    /// On-disk pipeline cache blob, loaded at startup and written at shutdown
    pub pipeline_cache_path: Option<PathBuf>,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            num_threads: 1,
            max_buffers: 16384,
            max_textures: 512,
            max_samplers: 32,
            bindless_capacity: 1024,
            descriptor_pool_max_sets: 1024,
            pipeline_cache_path: None,
            enable_validation: cfg!(debug_assertions),
            app_name: "Orbit Application".to_string(),
        }
    }
}

impl CoreConfig {
    /// Reject configurations that would produce empty pools or an empty frame ring
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("frames_in_flight", self.frames_in_flight),
            ("num_threads", self.num_threads),
            ("max_buffers", self.max_buffers),
            ("max_textures", self.max_textures),
            ("max_samplers", self.max_samplers),
            ("bindless_capacity", self.bindless_capacity),
            ("descriptor_pool_max_sets", self.descriptor_pool_max_sets),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(Error::InitializationFailed(format!(
                    "CoreConfig::{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

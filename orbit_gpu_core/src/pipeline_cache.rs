//! On-disk pipeline cache
//!
//! The blob is opaque to the core: it is read at startup, handed to the
//! device, and serialized back at shutdown. A missing or incompatible file
//! only costs pipeline compile time, so it never fails startup.

use crate::error::Result;
use crate::gpu_device::{GpuDevice, RawPipelineCache};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct PipelineCache {
    device: Arc<dyn GpuDevice>,
    raw: RawPipelineCache,
    path: Option<PathBuf>,
}

impl PipelineCache {
    /// Create the cache, seeded from `path` when the file exists and is usable
    pub fn load(device: Arc<dyn GpuDevice>, path: Option<&Path>) -> Result<Self> {
        let initial = match path {
            Some(path) => Self::read_blob(path),
            None => Vec::new(),
        };

        let raw = if initial.is_empty() {
            device.create_pipeline_cache(&[])?
        } else {
            match device.create_pipeline_cache(&initial) {
                Ok(raw) => {
                    engine_info!(
                        "orbit::PipelineCache",
                        "Loaded pipeline cache ({} bytes)",
                        initial.len()
                    );
                    raw
                }
                Err(e) => {
                    engine_warn!(
                        "orbit::PipelineCache",
                        "Pipeline cache rejected by the device ({}), starting empty",
                        e
                    );
                    device.create_pipeline_cache(&[])?
                }
            }
        };

        Ok(Self {
            device,
            raw,
            path: path.map(Path::to_path_buf),
        })
    }

    fn read_blob(path: &Path) -> Vec<u8> {
        match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                engine_debug!(
                    "orbit::PipelineCache",
                    "No pipeline cache at {}, starting empty",
                    path.display()
                );
                Vec::new()
            }
            Err(e) => {
                engine_warn!(
                    "orbit::PipelineCache",
                    "Cannot read pipeline cache {}: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    pub fn raw(&self) -> RawPipelineCache {
        self.raw
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the current cache contents back to its file
    ///
    /// Returns the number of bytes written, 0 when the cache has no path.
    pub fn save(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let data = self.device.pipeline_cache_data(self.raw)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        if let Err(e) = std::fs::write(path, &data) {
            engine_error!(
                "orbit::PipelineCache",
                "Cannot write pipeline cache {}: {}",
                path.display(),
                e
            );
            return Err(e.into());
        }

        engine_info!(
            "orbit::PipelineCache",
            "Saved pipeline cache ({} bytes) to {}",
            data.len(),
            path.display()
        );
        Ok(data.len())
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        self.device.destroy_pipeline_cache(self.raw);
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;

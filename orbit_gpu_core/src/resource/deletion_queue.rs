use crate::gpu_device::{RawImage, RawImageView};
use crate::pool::{BufferHandle, SamplerHandle, TextureHandle};

/// Resource waiting for its frame-delayed destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingDeletion {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Sampler(SamplerHandle),
    /// Native objects replaced by a resize; the slot itself stays live
    RetiredImage { image: RawImage, view: RawImageView },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionEntry {
    pub resource: PendingDeletion,
    /// Frame number at which the resource was destroyed
    pub enqueued_frame: u64,
}

/// Frame-stamped queue of destroyed resources
///
/// An entry becomes ready once `current_frame - enqueued_frame >= depth`,
/// i.e. once every frame that could still reference it has completed.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<DeletionEntry>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, resource: PendingDeletion, frame: u64) {
        self.entries.push(DeletionEntry {
            resource,
            enqueued_frame: frame,
        });
    }

    /// Remove and return every entry old enough to free
    ///
    /// The queue is compacted in a single pass; ready entries keep their
    /// enqueue order.
    pub fn drain_ready(&mut self, current_frame: u64, depth: u64) -> Vec<DeletionEntry> {
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| current_frame.saturating_sub(entry.enqueued_frame) >= depth);
        self.entries = pending;
        ready
    }

    /// Remove every entry regardless of age (shutdown)
    pub fn drain_all(&mut self) -> Vec<DeletionEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, resource: &PendingDeletion) -> bool {
        self.entries.iter().any(|entry| entry.resource == *resource)
    }
}

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;

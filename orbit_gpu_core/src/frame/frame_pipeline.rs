//! N-deep ring of frame synchronization objects
//!
//! `begin_frame` is the only place the frame-boundary operations run, always
//! in the same order: wait on the slot's fence, reset the slot's command
//! pools and descriptor allocators, then flush deletions that are at least
//! N frames old. `end_frame` submits the frame's primary command buffers
//! with the slot's fence and advances the frame counter.

use crate::command::{CommandBuffer, CommandBufferManager, RecordingState};
use crate::descriptor::DescriptorAllocatorGrid;
use crate::error::{Error, Result};
use crate::gpu_device::{
    CommandBufferLevel, GpuDevice, PipelineStages, QueueType, RawCommandBuffer, RawFence,
    RawSemaphore, SubmitInfo,
};
use crate::resource::ResourceManager;
use crate::{engine_debug, engine_error, engine_info};
use std::sync::Arc;

/// Effectively infinite; a fence that never signals is a lost device
const FENCE_TIMEOUT_NS: u64 = u64::MAX;

/// Synchronization objects of one frame slot
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled when the slot's last submission completed (created signaled)
    pub in_flight_fence: RawFence,
    /// Waited on by the frame's submission when presenting
    pub image_available: RawSemaphore,
    /// Signaled by the frame's submission when presenting
    pub render_finished: RawSemaphore,
}

/// Frame being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// Absolute frame number, starting at 0
    pub frame_number: u64,
    /// `frame_number % frames_in_flight`
    pub frame_slot: u32,
    pub image_available: RawSemaphore,
    pub render_finished: RawSemaphore,
}

pub struct FramePipeline {
    device: Arc<dyn GpuDevice>,
    frames: Vec<FrameSync>,
    frame_number: u64,
    in_frame: bool,
}

impl FramePipeline {
    pub fn new(device: Arc<dyn GpuDevice>, frames_in_flight: u32) -> Result<Self> {
        assert!(frames_in_flight > 0, "frames_in_flight must be greater than zero");

        let mut pipeline = Self {
            device: Arc::clone(&device),
            frames: Vec::with_capacity(frames_in_flight as usize),
            frame_number: 0,
            in_frame: false,
        };

        for _ in 0..frames_in_flight {
            let in_flight_fence = device.create_fence(true)?;
            let image_available = match device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_fence(in_flight_fence);
                    return Err(e);
                }
            };
            let render_finished = match device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_semaphore(image_available);
                    device.destroy_fence(in_flight_fence);
                    return Err(e);
                }
            };
            pipeline.frames.push(FrameSync {
                in_flight_fence,
                image_available,
                render_finished,
            });
        }

        engine_info!("orbit::FramePipeline", "Frame pipeline created ({} frames in flight)", frames_in_flight);

        Ok(pipeline)
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.frames.len() as u32
    }

    /// Number of the next frame to begin (or of the frame being recorded)
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frame_slot(&self) -> u32 {
        (self.frame_number % self.frames.len() as u64) as u32
    }

    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    pub fn frame_sync(&self, frame_slot: u32) -> &FrameSync {
        &self.frames[frame_slot as usize]
    }

    /// Start the next frame
    ///
    /// Blocks until the GPU is done with the previous occupant of the frame
    /// slot. A fence that fails to signal is reported as [`Error::DeviceLost`].
    ///
    /// # Panics
    ///
    /// Panics if the previous frame was not ended, or if the managers were
    /// built for a different frame depth.
    pub fn begin_frame(
        &mut self,
        commands: &CommandBufferManager,
        descriptors: &DescriptorAllocatorGrid,
        resources: &mut ResourceManager,
    ) -> Result<FrameContext> {
        assert!(!self.in_frame, "begin_frame() called twice without end_frame()");
        assert_eq!(
            commands.frames_in_flight(),
            self.frames_in_flight(),
            "command buffer manager frame depth differs from the frame pipeline"
        );
        assert_eq!(
            resources.frames_in_flight(),
            self.frames_in_flight(),
            "resource manager frame depth differs from the frame pipeline"
        );

        let frame_slot = self.frame_slot();
        let sync = self.frames[frame_slot as usize];

        if let Err(e) = self.device.wait_for_fence(sync.in_flight_fence, FENCE_TIMEOUT_NS) {
            engine_error!(
                "orbit::FramePipeline",
                "Frame {} (slot {}): fence wait failed: {}",
                self.frame_number,
                frame_slot,
                e
            );
            return Err(Error::DeviceLost(format!(
                "fence of frame slot {} never signaled: {}",
                frame_slot, e
            )));
        }

        commands.reset_pools(frame_slot)?;
        descriptors.reset_frame(frame_slot)?;
        resources.set_current_frame(self.frame_number);
        let freed = resources.process_pending_deletions();

        engine_debug!(
            "orbit::FramePipeline",
            "Frame {} begun (slot {}, {} deletions flushed)",
            self.frame_number,
            frame_slot,
            freed
        );

        self.in_frame = true;
        Ok(FrameContext {
            frame_number: self.frame_number,
            frame_slot,
            image_available: sync.image_available,
            render_finished: sync.render_finished,
        })
    }

    /// Submit the frame and advance the frame counter
    ///
    /// With `present`, the submission waits on `image_available` and signals
    /// `render_finished` for the swapchain layer.
    ///
    /// # Panics
    ///
    /// Panics without a matching `begin_frame()`, or if a command buffer is
    /// not an ended primary buffer.
    pub fn end_frame(&mut self, command_buffers: &[CommandBuffer], present: bool) -> Result<()> {
        assert!(self.in_frame, "end_frame() called without begin_frame()");

        let raws: Vec<RawCommandBuffer> = command_buffers
            .iter()
            .map(|cmd| {
                assert_eq!(cmd.level(), CommandBufferLevel::Primary, "end_frame() takes primary command buffers");
                assert_eq!(
                    cmd.state(),
                    RecordingState::Executable,
                    "command buffer {} submitted before end()",
                    cmd.raw().0
                );
                cmd.raw()
            })
            .collect();

        let sync = self.frames[self.frame_slot() as usize];
        let wait = [(sync.image_available, PipelineStages::COLOR_ATTACHMENT_OUTPUT)];
        let signal = [sync.render_finished];
        let wait_semaphores: &[(RawSemaphore, PipelineStages)] = if present { &wait } else { &[] };
        let signal_semaphores: &[RawSemaphore] = if present { &signal } else { &[] };
        let info = SubmitInfo {
            command_buffers: &raws,
            wait_semaphores,
            signal_semaphores,
        };

        // The frame is over whether or not the submission succeeds
        self.in_frame = false;
        self.device.reset_fence(sync.in_flight_fence)?;
        if let Err(e) = self.device.submit(QueueType::Graphics, &info, Some(sync.in_flight_fence)) {
            engine_error!("orbit::FramePipeline", "Frame {} submission failed: {}", self.frame_number, e);
            return Err(e);
        }

        self.frame_number += 1;
        Ok(())
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_error!("orbit::FramePipeline", "wait_idle failed during drop: {}", e);
        }
        for sync in self.frames.drain(..) {
            self.device.destroy_semaphore(sync.render_finished);
            self.device.destroy_semaphore(sync.image_available);
            self.device.destroy_fence(sync.in_flight_fence);
        }
    }
}

#[cfg(test)]
#[path = "frame_pipeline_tests.rs"]
mod tests;

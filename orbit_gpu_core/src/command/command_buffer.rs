use crate::error::Result;
use crate::gpu_device::{
    BufferBarrier, BufferCopy, BufferImageCopy, CommandBufferLevel, CommandBufferUsage,
    GpuDevice, ImageBarrier, InheritanceInfo, PipelineBindPoint, QueueType, RawBuffer,
    RawCommandBuffer, RawDescriptorSet, RawImage, RawPipelineLayout,
};
use std::sync::Arc;

/// Recording state of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Freshly allocated or reset
    Initial,
    /// Between begin and end
    Recording,
    /// Ended, ready to submit or execute
    Executable,
}

/// Command buffer handed out by the command buffer manager
///
/// A thin recording wrapper around a native command buffer. The native
/// buffer belongs to its pool; this value becomes stale once the pool that
/// produced it is reset.
pub struct CommandBuffer {
    device: Arc<dyn GpuDevice>,
    raw: RawCommandBuffer,
    level: CommandBufferLevel,
    queue: QueueType,
    state: RecordingState,
}

impl CommandBuffer {
    pub(crate) fn new(
        device: Arc<dyn GpuDevice>,
        raw: RawCommandBuffer,
        level: CommandBufferLevel,
        queue: QueueType,
    ) -> Self {
        Self {
            device,
            raw,
            level,
            queue,
            state: RecordingState::Initial,
        }
    }

    pub fn raw(&self) -> RawCommandBuffer {
        self.raw
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    /// Queue family the owning pool was created for
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    fn assert_recording(&self, op: &str) {
        assert!(
            self.is_recording(),
            "CommandBuffer::{}: command buffer {} is not recording (state {:?})",
            op,
            self.raw.0,
            self.state
        );
    }

    // ===== LIFECYCLE =====

    /// Begin recording a primary command buffer for one-time submission
    pub fn begin(&mut self) -> Result<()> {
        assert_eq!(self.level, CommandBufferLevel::Primary, "begin() on a secondary command buffer");
        assert!(!self.is_recording(), "begin() on a command buffer that is already recording");
        self.device
            .begin_command_buffer(self.raw, CommandBufferUsage::OneTimeSubmit, None)?;
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Begin recording a secondary command buffer inside a primary's rendering scope
    pub fn begin_secondary(&mut self, inheritance: &InheritanceInfo) -> Result<()> {
        assert_eq!(
            self.level,
            CommandBufferLevel::Secondary,
            "begin_secondary() on a primary command buffer"
        );
        assert!(!self.is_recording(), "begin_secondary() on a command buffer that is already recording");
        self.device.begin_command_buffer(
            self.raw,
            CommandBufferUsage::RenderPassContinue,
            Some(inheritance),
        )?;
        self.state = RecordingState::Recording;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.assert_recording("end");
        self.device.end_command_buffer(self.raw)?;
        self.state = RecordingState::Executable;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.device.reset_command_buffer(self.raw)?;
        self.state = RecordingState::Initial;
        Ok(())
    }

    // ===== RECORDING =====

    pub fn copy_buffer(&mut self, src: RawBuffer, dst: RawBuffer, regions: &[BufferCopy]) {
        self.assert_recording("copy_buffer");
        self.device.cmd_copy_buffer(self.raw, src, dst, regions);
    }

    pub fn copy_buffer_to_image(
        &mut self,
        src: RawBuffer,
        dst: RawImage,
        is_depth: bool,
        region: &BufferImageCopy,
    ) {
        self.assert_recording("copy_buffer_to_image");
        self.device
            .cmd_copy_buffer_to_image(self.raw, src, dst, is_depth, region);
    }

    pub fn pipeline_barrier(&mut self, buffer_barriers: &[BufferBarrier], image_barriers: &[ImageBarrier]) {
        self.assert_recording("pipeline_barrier");
        if buffer_barriers.is_empty() && image_barriers.is_empty() {
            return;
        }
        self.device
            .cmd_pipeline_barrier(self.raw, buffer_barriers, image_barriers);
    }

    pub fn bind_descriptor_sets(
        &mut self,
        bind_point: PipelineBindPoint,
        layout: RawPipelineLayout,
        first_set: u32,
        sets: &[RawDescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.assert_recording("bind_descriptor_sets");
        self.device
            .cmd_bind_descriptor_sets(self.raw, bind_point, layout, first_set, sets, dynamic_offsets);
    }

    /// Execute recorded secondary command buffers
    pub fn execute_commands(&mut self, secondaries: &[CommandBuffer]) {
        self.assert_recording("execute_commands");
        assert_eq!(self.level, CommandBufferLevel::Primary, "execute_commands() on a secondary command buffer");
        let raws: Vec<RawCommandBuffer> = secondaries
            .iter()
            .map(|secondary| {
                assert_eq!(secondary.level, CommandBufferLevel::Secondary);
                assert_eq!(
                    secondary.state,
                    RecordingState::Executable,
                    "secondary command buffer {} executed before end()",
                    secondary.raw.0
                );
                secondary.raw
            })
            .collect();
        self.device.cmd_execute_commands(self.raw, &raws);
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("raw", &self.raw)
            .field("level", &self.level)
            .field("queue", &self.queue)
            .field("state", &self.state)
            .finish()
    }
}

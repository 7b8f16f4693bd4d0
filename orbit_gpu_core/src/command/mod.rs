//! Command buffer recording, per-frame pools and immediate submission

pub mod command_buffer;
pub mod command_buffer_manager;
pub mod immediate;

pub use command_buffer::{CommandBuffer, RecordingState};
pub use command_buffer_manager::{
    CommandBufferManager, CommandBufferStats, MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD,
    MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD,
};
pub use immediate::ImmediateSubmitter;

pub mod frame_pipeline;

pub use frame_pipeline::{FrameContext, FramePipeline, FrameSync};

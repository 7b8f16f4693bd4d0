//! Resource state tracking and barrier derivation
//!
//! Each buffer and texture record carries a [`ResourceState`]. Transitions
//! go through [`barrier_for`], a pure function with no device access.

use bitflags::bitflags;

bitflags! {
    /// Logical usage state of a GPU resource
    ///
    /// The empty set is the undefined state of a freshly created resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const VERTEX_AND_UNIFORM_BUFFER = 1 << 0;
        const INDEX_BUFFER              = 1 << 1;
        const RENDER_TARGET             = 1 << 2;
        const UNORDERED_ACCESS          = 1 << 3;
        const DEPTH_WRITE               = 1 << 4;
        const DEPTH_READ                = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        const PIXEL_SHADER_RESOURCE     = 1 << 7;
        const INDIRECT_ARGUMENT         = 1 << 8;
        const COPY_DEST                 = 1 << 9;
        const COPY_SOURCE               = 1 << 10;
        const PRESENT                   = 1 << 11;
        const COMMON                    = 1 << 12;

        const SHADER_RESOURCE = Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits();
        const GENERIC_READ = Self::VERTEX_AND_UNIFORM_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    /// State of a resource that has never been used
    pub const UNDEFINED: Self = Self::empty();

    /// True if the state includes any GPU write
    pub fn is_write(&self) -> bool {
        self.intersects(
            ResourceState::RENDER_TARGET
                | ResourceState::UNORDERED_ACCESS
                | ResourceState::DEPTH_WRITE
                | ResourceState::COPY_DEST,
        )
    }
}

bitflags! {
    /// Pipeline stages a barrier waits on or blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE             = 1 << 0;
        const DRAW_INDIRECT           = 1 << 1;
        const VERTEX_INPUT            = 1 << 2;
        const VERTEX_SHADER           = 1 << 3;
        const FRAGMENT_SHADER         = 1 << 4;
        const EARLY_FRAGMENT_TESTS    = 1 << 5;
        const LATE_FRAGMENT_TESTS     = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER          = 1 << 8;
        const TRANSFER                = 1 << 9;
        const BOTTOM_OF_PIPE          = 1 << 10;
        const ALL_COMMANDS            = 1 << 11;
    }
}

bitflags! {
    /// Memory accesses made visible or available by a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ          = 1 << 0;
        const INDEX_READ                     = 1 << 1;
        const VERTEX_ATTRIBUTE_READ          = 1 << 2;
        const UNIFORM_READ                   = 1 << 3;
        const SHADER_READ                    = 1 << 4;
        const SHADER_WRITE                   = 1 << 5;
        const COLOR_ATTACHMENT_READ          = 1 << 6;
        const COLOR_ATTACHMENT_WRITE         = 1 << 7;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 9;
        const TRANSFER_READ                  = 1 << 10;
        const TRANSFER_WRITE                 = 1 << 11;
        const MEMORY_READ                    = 1 << 12;
    }
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// Stage and access masks for one state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierMasks {
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
}

/// Memory accesses implied by a state
pub fn access_flags(state: ResourceState) -> AccessFlags {
    let mut flags = AccessFlags::empty();

    if state.contains(ResourceState::COPY_SOURCE) {
        flags |= AccessFlags::TRANSFER_READ;
    }
    if state.contains(ResourceState::COPY_DEST) {
        flags |= AccessFlags::TRANSFER_WRITE;
    }
    if state.contains(ResourceState::VERTEX_AND_UNIFORM_BUFFER) {
        flags |= AccessFlags::UNIFORM_READ | AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if state.contains(ResourceState::RENDER_TARGET) {
        flags |= AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::DEPTH_WRITE) {
        flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::DEPTH_READ) {
        flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        flags |= AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE;
    }
    if state.contains(ResourceState::INDEX_BUFFER) {
        flags |= AccessFlags::INDEX_READ;
    }
    if state.intersects(ResourceState::SHADER_RESOURCE) {
        flags |= AccessFlags::SHADER_READ;
    }
    if state.contains(ResourceState::INDIRECT_ARGUMENT) {
        flags |= AccessFlags::INDIRECT_COMMAND_READ;
    }
    if state.contains(ResourceState::PRESENT) {
        flags |= AccessFlags::MEMORY_READ;
    }

    flags
}

/// Image layout a texture must be in for a state
///
/// Write states take priority over read states when several are combined.
pub fn image_layout(state: ResourceState) -> ImageLayout {
    if state.is_empty() {
        ImageLayout::Undefined
    } else if state.contains(ResourceState::COPY_DEST) {
        ImageLayout::TransferDst
    } else if state.contains(ResourceState::RENDER_TARGET) {
        ImageLayout::ColorAttachment
    } else if state.contains(ResourceState::DEPTH_WRITE) {
        ImageLayout::DepthStencilAttachment
    } else if state.contains(ResourceState::UNORDERED_ACCESS) {
        ImageLayout::General
    } else if state.contains(ResourceState::COPY_SOURCE) {
        ImageLayout::TransferSrc
    } else if state.contains(ResourceState::DEPTH_READ) {
        ImageLayout::DepthStencilReadOnly
    } else if state.intersects(ResourceState::SHADER_RESOURCE) {
        ImageLayout::ShaderReadOnly
    } else if state.contains(ResourceState::PRESENT) {
        ImageLayout::PresentSrc
    } else {
        ImageLayout::General
    }
}

/// Pipeline stages that touch a resource in a state
///
/// The undefined state maps to `TOP_OF_PIPE` (nothing to wait on).
pub fn pipeline_stages(state: ResourceState) -> PipelineStages {
    if state.is_empty() {
        return PipelineStages::TOP_OF_PIPE;
    }

    let mut stages = PipelineStages::empty();

    if state.intersects(ResourceState::VERTEX_AND_UNIFORM_BUFFER | ResourceState::INDEX_BUFFER) {
        stages |= PipelineStages::VERTEX_INPUT;
    }
    if state.contains(ResourceState::VERTEX_AND_UNIFORM_BUFFER) {
        stages |= PipelineStages::VERTEX_SHADER | PipelineStages::FRAGMENT_SHADER;
    }
    if state.contains(ResourceState::NON_PIXEL_SHADER_RESOURCE) {
        stages |= PipelineStages::VERTEX_SHADER | PipelineStages::COMPUTE_SHADER;
    }
    if state.contains(ResourceState::PIXEL_SHADER_RESOURCE) {
        stages |= PipelineStages::FRAGMENT_SHADER;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        stages |= PipelineStages::COMPUTE_SHADER | PipelineStages::FRAGMENT_SHADER;
    }
    if state.contains(ResourceState::RENDER_TARGET) {
        stages |= PipelineStages::COLOR_ATTACHMENT_OUTPUT;
    }
    if state.intersects(ResourceState::DEPTH_WRITE | ResourceState::DEPTH_READ) {
        stages |= PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS;
    }
    if state.contains(ResourceState::INDIRECT_ARGUMENT) {
        stages |= PipelineStages::DRAW_INDIRECT;
    }
    if state.intersects(ResourceState::COPY_SOURCE | ResourceState::COPY_DEST) {
        stages |= PipelineStages::TRANSFER;
    }
    if state.contains(ResourceState::PRESENT) {
        stages |= PipelineStages::BOTTOM_OF_PIPE;
    }
    if state.contains(ResourceState::COMMON) {
        stages |= PipelineStages::ALL_COMMANDS;
    }

    stages
}

/// Derive the barrier for a transition from `old` to `new`
pub fn barrier_for(old: ResourceState, new: ResourceState) -> BarrierMasks {
    BarrierMasks {
        src_stages: pipeline_stages(old),
        dst_stages: pipeline_stages(new),
        src_access: access_flags(old),
        dst_access: access_flags(new),
        old_layout: image_layout(old),
        new_layout: image_layout(new),
    }
}

/// True if moving from `old` to `new` requires a barrier
///
/// Read-to-same-read transitions are free; write-after-write on the same
/// state still needs an execution dependency.
pub fn needs_barrier(old: ResourceState, new: ResourceState) -> bool {
    old != new || new.is_write()
}

#[cfg(test)]
#[path = "resource_state_tests.rs"]
mod tests;

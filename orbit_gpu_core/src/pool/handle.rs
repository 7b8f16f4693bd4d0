//! Typed resource handles
//!
//! A handle is a bare slot index. There is no generation counter: a handle
//! stays meaningful until its deletion-queue entry is flushed, and the
//! N-frame deletion delay is what keeps in-flight references valid.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name {
                pub index: u32,
            }

            impl $name {
                /// Sentinel meaning "no resource"
                pub const INVALID: Self = Self { index: u32::MAX };

                pub const fn new(index: u32) -> Self {
                    Self { index }
                }

                pub fn is_valid(&self) -> bool {
                    self.index != u32::MAX
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::INVALID
                }
            }
        )*
    };
}

define_handle!(
    /// Handle to a buffer in the resource manager
    BufferHandle,
    /// Handle to a texture or texture view in the resource manager
    TextureHandle,
    /// Handle to a sampler in the resource manager
    SamplerHandle,
);

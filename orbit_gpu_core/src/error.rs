//! Error types for the Orbit GPU core
//!
//! This module defines the error types used throughout the core,
//! including device failures, pool exhaustion, and resource lookups.
//!
//! Programmer errors (double release, command buffer budget overrun,
//! out-of-order frame operations) are assertions, not variants here.

use std::fmt;

/// Result type for Orbit GPU core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Orbit GPU core errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (stale handle, missing parent, bad size, etc.)
    InvalidResource(String),

    /// Initialization failed (device, pools, configuration)
    InitializationFailed(String),

    /// A fixed-capacity pool has no free slot left
    OutOfSlots {
        /// Debug name of the exhausted pool
        pool: String,
        /// Capacity the pool was created with
        capacity: u32,
    },

    /// The device stopped responding (fence never signaled, lost device)
    DeviceLost(String),

    /// Filesystem error (pipeline cache load/save)
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::OutOfSlots { pool, capacity } => {
                write!(f, "Pool '{}' exhausted (capacity {})", pool, capacity)
            }
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

//! Vulkan backend configuration
//!
//! Carries the validation-layer settings on top of the core configuration.

use orbit_gpu_core::orbit::CoreConfig;

/// Minimum severity of validation messages that get reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to a log file
    File(String),
    /// Console and log file
    Both(String),
}

/// Validation message categories to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters, by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Configuration for `VulkanGpuDevice`
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    ///
    /// Only honored when the crate is built with the `vulkan-validation` feature.
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error (for debugger attachment)
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,
    pub app_name: String,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: cfg!(debug_assertions),
            app_name: "Orbit Application".to_string(),
        }
    }
}

impl VulkanConfig {
    /// Default Vulkan settings, with validation and app name taken from the core config
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            enable_validation: config.enable_validation,
            app_name: config.app_name.clone(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "vulkan_config_tests.rs"]
mod tests;

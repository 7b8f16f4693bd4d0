//! Vulkan debug messenger
//!
//! Receives validation layer messages, filters them by severity and category,
//! counts them, and forwards them to the engine logger and/or a log file.

use crate::vulkan_config::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats};
use ash::vk;
use colored::*;
use orbit_gpu_core::orbit::log::LogSeverity;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

const SOURCE: &str = "orbit::vulkan::validation";

static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message text, used to tag repeats
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Settings read by the messenger callback
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the callback configuration and reset the counters
pub(crate) fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    *MESSAGE_TRACKER.lock().unwrap_or_else(PoisonError::into_inner) = Some(FxHashMap::default());
    *DEBUG_CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = Some(config);
}

/// Drop the callback configuration so late messages are ignored during teardown
pub(crate) fn cleanup_debug_config() {
    *DEBUG_CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Messenger severities to subscribe to for a severity filter
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Current validation message counters
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let tracker = MESSAGE_TRACKER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(messages) = tracker.as_ref() {
        let repeated = messages.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), repeated);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

fn passes_severity(filter: DebugSeverity, severity: LogSeverity) -> bool {
    match filter {
        DebugSeverity::ErrorsOnly => severity == LogSeverity::Error,
        DebugSeverity::ErrorsAndWarnings => severity >= LogSeverity::Warn,
        DebugSeverity::All => true,
    }
}

fn message_category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn passes_category(filter: &DebugMessageFilter, category: &str) -> bool {
    match category {
        "Validation" => filter.show_validation,
        "Performance" => filter.show_performance,
        _ => filter.show_general,
    }
}

fn track_message(message: &str) -> u32 {
    let mut tracker = MESSAGE_TRACKER.lock().unwrap_or_else(PoisonError::into_inner);
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

unsafe fn callback_str<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        fallback
    } else {
        CStr::from_ptr(ptr).to_str().unwrap_or("Invalid UTF-8")
    }
}

/// Debug messenger callback installed at instance creation
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_name = callback_str(callback_data.p_message_id_name, "Unknown");
    let message = callback_str(callback_data.p_message, "No message");

    let config = match DEBUG_CONFIG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        Some(config) => config.clone(),
        None => return vk::FALSE,
    };

    let severity = log_severity(message_severity);
    let category = message_category(message_type);
    if !passes_severity(config.severity, severity)
        || !passes_category(&config.message_filter, category)
    {
        return vk::FALSE;
    }

    let repeat_indicator = if config.enable_stats {
        VALIDATION_STATS.record(severity);
        match track_message(message) {
            1 => String::new(),
            count => format!(" [×{}]", count),
        }
    } else {
        String::new()
    };

    let text = format!(
        "[{}]{} {}: {}",
        category, repeat_indicator, message_id_name, message
    );

    match &config.output {
        DebugOutput::Console => orbit_gpu_core::log::log(severity, SOURCE, text),
        DebugOutput::File(path) => write_to_file(path, severity, &text),
        DebugOutput::Both(path) => {
            write_to_file(path, severity, &text);
            orbit_gpu_core::log::log(severity, SOURCE, text);
        }
    }

    if severity == LogSeverity::Error && config.panic_on_error {
        panic!(
            "Vulkan validation error (strict mode)\nMessage ID: {}\nType: {}\nMessage: {}",
            message_id_name, category, message
        );
    }

    if severity == LogSeverity::Error && config.break_on_error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n  Message: {}\n",
            "⚠️  BREAK ON VALIDATION ERROR - Aborting execution".red().bold(),
            message_id_name.yellow(),
            category.cyan(),
            message.white()
        );
        std::process::abort();
    }

    vk::FALSE
}

fn write_to_file(path: &str, severity: LogSeverity, text: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "[VULKAN {:?}] {}", severity, text);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;

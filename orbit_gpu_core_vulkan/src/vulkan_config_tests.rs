use super::*;

// ============================================================================
// DEFAULTS
// ============================================================================

#[test]
fn test_default_filter_shows_every_category() {
    let filter = DebugMessageFilter::default();

    assert!(filter.show_general);
    assert!(filter.show_validation);
    assert!(filter.show_performance);
}

#[test]
fn test_default_config_reports_errors_and_warnings_to_console() {
    let config = VulkanConfig::default();

    assert_eq!(config.debug_severity, DebugSeverity::ErrorsAndWarnings);
    assert_eq!(config.debug_output, DebugOutput::Console);
    assert!(!config.break_on_validation_error);
    assert!(!config.panic_on_error);
}

// ============================================================================
// FROM CORE CONFIG
// ============================================================================

#[test]
fn test_from_core_copies_validation_and_app_name() {
    let core = CoreConfig {
        enable_validation: true,
        app_name: "Orbit Viewer".to_string(),
        ..CoreConfig::default()
    };

    let config = VulkanConfig::from_core(&core);

    assert!(config.enable_validation);
    assert_eq!(config.app_name, "Orbit Viewer");
}

#[test]
fn test_from_core_with_validation_disabled() {
    let core = CoreConfig {
        enable_validation: false,
        ..CoreConfig::default()
    };

    assert!(!VulkanConfig::from_core(&core).enable_validation);
}

// ============================================================================
// VALIDATION STATS
// ============================================================================

#[test]
fn test_validation_stats_total() {
    let stats = ValidationStats {
        errors: 2,
        warnings: 3,
        info: 4,
        verbose: 5,
    };

    assert_eq!(stats.total(), 14);
    assert_eq!(ValidationStats::default().total(), 0);
}

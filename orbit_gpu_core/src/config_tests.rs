use crate::config::CoreConfig;
use crate::error::Error;

// ============================================================================
// DEFAULTS
// ============================================================================

#[test]
fn test_default_values() {
    let config = CoreConfig::default();
    assert_eq!(config.frames_in_flight, 2);
    assert_eq!(config.num_threads, 1);
    assert_eq!(config.max_buffers, 16384);
    assert_eq!(config.max_textures, 512);
    assert_eq!(config.max_samplers, 32);
    assert_eq!(config.bindless_capacity, 1024);
    assert_eq!(config.descriptor_pool_max_sets, 1024);
    assert!(config.pipeline_cache_path.is_none());
    assert_eq!(config.enable_validation, cfg!(debug_assertions));
}

#[test]
fn test_default_is_valid() {
    assert!(CoreConfig::default().validate().is_ok());
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_zero_frames_in_flight_rejected() {
    let config = CoreConfig { frames_in_flight: 0, ..Default::default() };
    match config.validate() {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("frames_in_flight")),
        other => panic!("expected InitializationFailed, got {:?}", other),
    }
}

#[test]
fn test_zero_threads_rejected() {
    let config = CoreConfig { num_threads: 0, ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_zero_capacity_rejected() {
    let config = CoreConfig { max_samplers: 0, ..Default::default() };
    match config.validate() {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("max_samplers")),
        other => panic!("expected InitializationFailed, got {:?}", other),
    }
}

use super::*;
use crate::gpu_device::{MockGpuDevice, MockObjectKind, MOCK_PIPELINE_CACHE_MAGIC};

fn device() -> Arc<MockGpuDevice> {
    Arc::new(MockGpuDevice::new())
}

#[test]
fn test_load_without_path() {
    let device = device();
    let cache = PipelineCache::load(device.clone(), None).unwrap();
    assert!(!cache.raw().is_null());
    assert!(cache.path().is_none());
    assert_eq!(cache.save().unwrap(), 0);
}

#[test]
fn test_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.cache");
    let cache = PipelineCache::load(device(), Some(&path)).unwrap();
    assert!(!cache.raw().is_null());
    assert!(!path.exists());
}

#[test]
fn test_save_then_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pipeline.cache");
    let device = device();

    let cache = PipelineCache::load(device.clone(), Some(&path)).unwrap();
    let written = cache.save().unwrap();
    assert_eq!(written, MOCK_PIPELINE_CACHE_MAGIC.len());
    drop(cache);

    let data = std::fs::read(&path).unwrap();
    assert!(data.starts_with(MOCK_PIPELINE_CACHE_MAGIC));

    let reloaded = PipelineCache::load(device.clone(), Some(&path)).unwrap();
    assert_eq!(device.pipeline_cache_data(reloaded.raw()).unwrap(), data);
}

#[test]
fn test_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.cache");
    std::fs::write(&path, b"not a pipeline cache").unwrap();
    let device = device();

    let cache = PipelineCache::load(device.clone(), Some(&path)).unwrap();
    assert_eq!(
        device.pipeline_cache_data(cache.raw()).unwrap(),
        MOCK_PIPELINE_CACHE_MAGIC.to_vec()
    );
    assert_eq!(device.live_count(MockObjectKind::PipelineCache), 1);
}

#[test]
fn test_drop_destroys_native_cache() {
    let device = device();
    drop(PipelineCache::load(device.clone(), None).unwrap());
    assert_eq!(device.live_count(MockObjectKind::PipelineCache), 0);
}

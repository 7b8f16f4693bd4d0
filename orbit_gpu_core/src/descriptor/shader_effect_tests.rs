use super::*;
use crate::command::CommandBufferManager;
use crate::descriptor::BindingTableEntry;
use crate::gpu_device::{MockGpuDevice, MockObjectKind, ShaderStageFlags};

fn entry(name: &str, set: u32, binding: u32, descriptor_type: DescriptorType) -> BindingTableEntry {
    BindingTableEntry {
        name: name.to_string(),
        set,
        binding,
        descriptor_type,
        count: 1,
        stages: ShaderStageFlags::ALL_GRAPHICS,
    }
}

fn forward_table() -> BindingTable {
    BindingTable::from_entries([
        entry("sceneData", 0, 0, DescriptorType::UniformBuffer),
        entry("albedo", 1, 0, DescriptorType::CombinedImageSampler),
        entry("normalMap", 1, 1, DescriptorType::CombinedImageSampler),
        entry("objectData", 2, 0, DescriptorType::UniformBufferDynamic),
    ])
    .unwrap()
}

struct Fixture {
    device: Arc<MockGpuDevice>,
    effect: Arc<ShaderEffect>,
    allocator: DescriptorAllocator,
}

fn fixture() -> Fixture {
    let device = Arc::new(MockGpuDevice::new());
    let dyn_device: Arc<dyn GpuDevice> = device.clone();
    let effect = ShaderEffect::new(
        Arc::clone(&dyn_device),
        "forward",
        forward_table(),
        None,
        0,
        PipelineBindPoint::Graphics,
    )
    .unwrap();
    Fixture {
        device,
        effect: Arc::new(effect),
        allocator: DescriptorAllocator::new(dyn_device, 64),
    }
}

fn buffer(id: u64) -> BufferBinding {
    BufferBinding {
        buffer: RawBuffer(id),
        offset: 0,
        range: 256,
    }
}

fn image(view: u64) -> ImageBinding {
    ImageBinding {
        view: RawImageView(view),
        sampler: Some(RawSampler(900)),
        layout: ImageLayout::ShaderReadOnly,
    }
}

// ============================================================================
// SHADER EFFECT
// ============================================================================

#[test]
fn test_effect_creates_one_layout_per_set() {
    let f = fixture();
    assert_eq!(f.device.live_count(MockObjectKind::DescriptorSetLayout), 3);
    assert_eq!(f.device.live_count(MockObjectKind::PipelineLayout), 1);
    assert!(!f.effect.set_layout(2).is_null());
    assert!(f.effect.set_layout(3).is_null());
}

#[test]
fn test_effect_drop_releases_layouts() {
    let Fixture { device, effect, allocator } = fixture();
    drop(allocator);
    drop(effect);
    assert_eq!(device.live_count(MockObjectKind::DescriptorSetLayout), 0);
    assert_eq!(device.live_count(MockObjectKind::PipelineLayout), 0);
}

#[test]
fn test_effect_gap_sets_get_empty_layouts() {
    let device = Arc::new(MockGpuDevice::new());
    let table = BindingTable::from_entries([entry("params", 2, 0, DescriptorType::StorageBuffer)]).unwrap();
    let effect = ShaderEffect::new(device.clone(), "gap", table, None, 16, PipelineBindPoint::Compute).unwrap();
    assert!(!effect.set_layout(0).is_null());
    assert!(!effect.set_layout(1).is_null());
    assert_eq!(device.live_count(MockObjectKind::DescriptorSetLayout), 3);
}

#[test]
fn test_effect_bindless_set_requires_table() {
    let device = Arc::new(MockGpuDevice::new());
    let table =
        BindingTable::from_entries([entry("textures", BINDLESS_SET_INDEX, 0, DescriptorType::CombinedImageSampler)])
            .unwrap();
    let result = ShaderEffect::new(device.clone(), "bindless", table, None, 0, PipelineBindPoint::Graphics);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert_eq!(device.live_count(MockObjectKind::DescriptorSetLayout), 0);
}

#[test]
fn test_effect_borrows_bindless_layout() {
    let device = Arc::new(MockGpuDevice::new());
    let bindless = BindlessTable::new(device.clone(), 16).unwrap();
    let effect = ShaderEffect::new(
        device.clone(),
        "forward",
        forward_table(),
        Some(&bindless),
        0,
        PipelineBindPoint::Graphics,
    )
    .unwrap();
    assert_eq!(effect.set_layout(BINDLESS_SET_INDEX), bindless.layout());

    drop(effect);
    // Only the bindless layout survives the effect
    assert_eq!(device.live_count(MockObjectKind::DescriptorSetLayout), 1);
}

// ============================================================================
// BIND VALIDATION
// ============================================================================

#[test]
fn test_bind_unknown_name_rejected() {
    let f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    assert!(!binder.bind_buffer("doesNotExist", buffer(1)));
    assert!(binder.dirty_sets().is_empty());
}

#[test]
fn test_bind_type_mismatch_rejected() {
    let f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    assert!(!binder.bind_image("sceneData", image(1)));
    assert!(!binder.bind_buffer("albedo", buffer(1)));
    assert!(!binder.bind_buffer("objectData", buffer(1)));
    assert!(!binder.bind_dynamic_buffer("sceneData", buffer(1), 0));
}

#[test]
fn test_bind_combined_sampler_requires_sampler() {
    let f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    let mut binding = image(1);
    binding.sampler = None;
    assert!(!binder.bind_image("albedo", binding));
}

#[test]
fn test_bind_marks_only_target_set_dirty() {
    let f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    assert!(binder.bind_image("albedo", image(1)));
    assert_eq!(binder.dirty_sets(), DirtySets::SET_1);
}

// ============================================================================
// BUILD SETS / CACHE
// ============================================================================

#[test]
fn test_build_sets_allocates_once_per_set() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.bind_image("albedo", image(2));
    binder.bind_image("normalMap", image(3));

    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 2);
    let stats = f.device.stats();
    assert_eq!(stats.descriptor_sets_allocated, 2);
    // One batched update per set
    assert_eq!(stats.descriptor_update_calls, 2);
    assert_eq!(stats.descriptor_writes, 3);
    assert!(binder.dirty_sets().is_empty());
}

#[test]
fn test_build_sets_twice_is_cache_hit() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.bind_image("albedo", image(2));
    binder.build_sets(&mut f.allocator).unwrap();

    let before = f.device.stats();
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 0);
    let after = f.device.stats();
    assert_eq!(after.descriptor_sets_allocated, before.descriptor_sets_allocated);
    assert_eq!(after.descriptor_update_calls, before.descriptor_update_calls);
}

#[test]
fn test_rebinding_same_texture_allocates_nothing() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_image("albedo", image(42));
    binder.build_sets(&mut f.allocator).unwrap();
    let allocated = f.device.stats().descriptor_sets_allocated;

    assert!(binder.bind_image("albedo", image(42)));
    assert!(binder.dirty_sets().is_empty());
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 0);
    assert_eq!(f.device.stats().descriptor_sets_allocated, allocated);
}

#[test]
fn test_change_invalidates_only_its_set() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.bind_image("albedo", image(2));
    binder.build_sets(&mut f.allocator).unwrap();
    let scene_set = binder.cached_set(0);
    let material_set = binder.cached_set(1);

    binder.bind_image("albedo", image(3));
    assert_eq!(binder.dirty_sets(), DirtySets::SET_1);
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 1);

    assert_eq!(binder.cached_set(0), scene_set);
    assert_ne!(binder.cached_set(1), material_set);
    // The rebuilt set carries every write of set 1, not just the changed one
    assert_eq!(
        f.device.descriptor_binding(binder.cached_set(1), 0, 0),
        Some(DescriptorResource::Image {
            view: RawImageView(3),
            sampler: Some(RawSampler(900)),
            layout: ImageLayout::ShaderReadOnly,
        })
    );
}

#[test]
fn test_rebuilt_set_rewrites_unchanged_bindings() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_image("albedo", image(2));
    binder.bind_image("normalMap", image(3));
    binder.build_sets(&mut f.allocator).unwrap();

    binder.bind_image("albedo", image(4));
    binder.build_sets(&mut f.allocator).unwrap();
    let set = binder.cached_set(1);
    assert!(f.device.descriptor_binding(set, 1, 0).is_some());
}

#[test]
fn test_allocator_reset_forces_rebuild() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.build_sets(&mut f.allocator).unwrap();

    f.allocator.reset().unwrap();
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 1);
    assert_eq!(f.device.stats().descriptor_sets_allocated, 2);
}

#[test]
fn test_different_allocator_forces_rebuild() {
    let mut f = fixture();
    let mut other = DescriptorAllocator::new(f.device.clone(), 8);
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.build_sets(&mut f.allocator).unwrap();

    assert_eq!(binder.build_sets(&mut other).unwrap(), 1);
}

#[test]
fn test_dynamic_offset_change_keeps_set() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_dynamic_buffer("objectData", buffer(7), 0);
    binder.build_sets(&mut f.allocator).unwrap();

    binder.bind_dynamic_buffer("objectData", buffer(7), 256);
    assert!(binder.dirty_sets().is_empty());
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 0);
}

#[test]
fn test_clear_forgets_everything() {
    let mut f = fixture();
    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.build_sets(&mut f.allocator).unwrap();

    binder.clear();
    assert!(binder.cached_set(0).is_null());
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 0);
}

// ============================================================================
// APPLY BINDS
// ============================================================================

#[test]
fn test_apply_binds_binds_each_built_set() {
    let mut f = fixture();
    let manager = CommandBufferManager::new(f.device.clone(), 1, 1).unwrap();
    let mut cmd = manager.get_command_buffer(0, 0, true).unwrap();

    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.bind_dynamic_buffer("objectData", buffer(2), 512);
    binder.build_sets(&mut f.allocator).unwrap();
    binder.apply_binds(&mut cmd);

    let commands = f.device.commands(cmd.raw());
    assert_eq!(
        commands[1..],
        [
            "bind_descriptor_sets(first=0, count=1, dynamic=[])".to_string(),
            "bind_descriptor_sets(first=2, count=1, dynamic=[512])".to_string(),
        ]
    );
}

#[test]
#[should_panic(expected = "call build_sets() first")]
fn test_apply_binds_before_build_panics() {
    let f = fixture();
    let manager = CommandBufferManager::new(f.device.clone(), 1, 1).unwrap();
    let mut cmd = manager.get_command_buffer(0, 0, true).unwrap();

    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.apply_binds(&mut cmd);
}

#[test]
#[should_panic(expected = "descriptor pool was reset")]
fn test_apply_binds_after_allocator_reset_panics() {
    let mut f = fixture();
    let manager = CommandBufferManager::new(f.device.clone(), 1, 1).unwrap();

    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.build_sets(&mut f.allocator).unwrap();

    // Next use of the frame slot: the pool is reset but the sets are not rebuilt
    f.allocator.reset().unwrap();
    let mut cmd = manager.get_command_buffer(0, 0, true).unwrap();
    binder.apply_binds(&mut cmd);
}

#[test]
fn test_apply_binds_after_rebuild_on_reset_allocator() {
    let mut f = fixture();
    let manager = CommandBufferManager::new(f.device.clone(), 1, 1).unwrap();

    let mut binder = ShaderEffectBinder::new(f.effect.clone());
    binder.bind_buffer("sceneData", buffer(1));
    binder.build_sets(&mut f.allocator).unwrap();

    f.allocator.reset().unwrap();
    assert_eq!(binder.build_sets(&mut f.allocator).unwrap(), 1);
    let mut cmd = manager.get_command_buffer(0, 0, true).unwrap();
    binder.apply_binds(&mut cmd);

    assert_eq!(
        f.device.commands(cmd.raw())[1..],
        ["bind_descriptor_sets(first=0, count=1, dynamic=[])".to_string()]
    );
}

#[test]
fn test_binders_share_effect_across_threads() {
    let f = fixture();
    let device: Arc<dyn GpuDevice> = f.device.clone();

    std::thread::scope(|scope| {
        for thread in 0..2u64 {
            let effect = f.effect.clone();
            let device = Arc::clone(&device);
            scope.spawn(move || {
                let mut allocator = DescriptorAllocator::new(device, 8);
                let mut binder = ShaderEffectBinder::new(effect);
                binder.bind_buffer("sceneData", buffer(100 + thread));
                assert_eq!(binder.build_sets(&mut allocator).unwrap(), 1);
            });
        }
    });

    assert_eq!(f.device.stats().descriptor_sets_allocated, 2);
}

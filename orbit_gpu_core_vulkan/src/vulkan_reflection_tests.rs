use super::*;

fn reflected(
    name: &str,
    set: u32,
    binding: u32,
    descriptor_type: DescriptorType,
    stages: ShaderStageFlags,
) -> ReflectedBinding {
    ReflectedBinding {
        name: Some(name.to_string()),
        set,
        binding,
        descriptor_type,
        count: 1,
        stages,
    }
}

fn forward_pass() -> Vec<ReflectedBinding> {
    vec![
        reflected("sceneData", 0, 0, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX),
        reflected("objectData", 2, 0, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX),
        reflected("sceneData", 0, 0, DescriptorType::UniformBuffer, ShaderStageFlags::FRAGMENT),
        reflected(
            "albedo",
            1,
            0,
            DescriptorType::CombinedImageSampler,
            ShaderStageFlags::FRAGMENT,
        ),
    ]
}

// ============================================================================
// MERGING
// ============================================================================

#[test]
fn test_stages_merged_across_modules() {
    let table = binding_table_from_reflected(forward_pass(), &[]).unwrap();

    assert_eq!(table.len(), 3);
    let scene = table.lookup("sceneData").unwrap();
    assert_eq!(scene.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);
    assert_eq!(table.lookup("albedo").unwrap().set, 1);
    assert_eq!(table.set_count(), 3);
}

#[test]
fn test_conflicting_types_rejected() {
    let bindings = vec![
        reflected("lights", 0, 1, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX),
        reflected("lights", 0, 1, DescriptorType::StorageBuffer, ShaderStageFlags::FRAGMENT),
    ];

    assert!(binding_table_from_reflected(bindings, &[]).is_err());
}

#[test]
fn test_unnamed_binding_gets_location_name() {
    let mut binding = reflected("", 2, 5, DescriptorType::StorageBuffer, ShaderStageFlags::COMPUTE);
    binding.name = None;

    let table = binding_table_from_reflected(vec![binding], &[]).unwrap();

    let entry = table.lookup("set2_binding5").unwrap();
    assert_eq!(entry.binding, 5);
}

// ============================================================================
// DYNAMIC BUFFERS
// ============================================================================

#[test]
fn test_dynamic_buffer_promoted() {
    let table = binding_table_from_reflected(forward_pass(), &["objectData"]).unwrap();

    assert_eq!(
        table.lookup("objectData").unwrap().descriptor_type,
        DescriptorType::UniformBufferDynamic
    );
    assert_eq!(
        table.lookup("sceneData").unwrap().descriptor_type,
        DescriptorType::UniformBuffer
    );
}

#[test]
fn test_dynamic_image_rejected() {
    assert!(binding_table_from_reflected(forward_pass(), &["albedo"]).is_err());
}

#[test]
fn test_missing_dynamic_buffer_rejected() {
    assert!(binding_table_from_reflected(forward_pass(), &["boneMatrices"]).is_err());
}

#[test]
fn test_dynamic_variant() {
    assert_eq!(
        dynamic_variant(DescriptorType::StorageBuffer),
        Some(DescriptorType::StorageBufferDynamic)
    );
    assert_eq!(dynamic_variant(DescriptorType::SampledImage), None);
}

// ============================================================================
// SPIR-V INPUT
// ============================================================================

#[test]
fn test_invalid_spirv_rejected() {
    let garbage = [0xDEAD_BEEFu32, 0, 0, 0, 0];

    let result = reflect_binding_table(&[(&garbage[..], ShaderStageFlags::VERTEX)], &[]);

    assert!(result.is_err());
}

//! SPIR-V reflection into binding tables
//!
//! Each stage module is reflected with spirq; bindings seen by several stages
//! are merged by `BindingTable::from_entries`.

use orbit_gpu_core::engine_bail;
use orbit_gpu_core::engine_err;
use orbit_gpu_core::orbit::descriptor::{BindingTable, BindingTableEntry};
use orbit_gpu_core::orbit::device::{DescriptorType, ShaderStageFlags};
use orbit_gpu_core::orbit::{Error, Result};

const SOURCE: &str = "orbit::vulkan::reflection";

/// One descriptor binding as found in a single stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub name: Option<String>,
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Reflect the descriptor bindings of several shader stages into one table
///
/// `dynamic_buffers` names the uniform/storage buffers bound with a dynamic
/// offset; SPIR-V does not distinguish them from plain buffers.
pub fn reflect_binding_table(
    modules: &[(&[u32], ShaderStageFlags)],
    dynamic_buffers: &[&str],
) -> Result<BindingTable> {
    let mut reflected = Vec::new();
    for &(code, stages) in modules {
        reflected.extend(reflect_module(code, stages)?);
    }
    binding_table_from_reflected(reflected, dynamic_buffers)
}

fn reflect_module(code: &[u32], stages: ShaderStageFlags) -> Result<Vec<ReflectedBinding>> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!(SOURCE, "SPIR-V reflection failed: {:?}", e))?;

    let mut bindings = Vec::new();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            if let spirq::var::Variable::Descriptor {
                name,
                desc_bind,
                desc_ty,
                nbind,
                ..
            } = var
            {
                bindings.push(ReflectedBinding {
                    name: name.clone(),
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    descriptor_type: spirq_descriptor_type(desc_ty)?,
                    // Runtime-sized arrays report zero
                    count: (*nbind).max(1),
                    stages,
                });
            }
        }
    }

    Ok(bindings)
}

fn spirq_descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spirq;
    match desc_ty {
        Spirq::UniformBuffer() => Ok(DescriptorType::UniformBuffer),
        Spirq::StorageBuffer(..) => Ok(DescriptorType::StorageBuffer),
        Spirq::CombinedImageSampler() => Ok(DescriptorType::CombinedImageSampler),
        Spirq::SampledImage() => Ok(DescriptorType::SampledImage),
        Spirq::StorageImage(..) => Ok(DescriptorType::StorageImage),
        Spirq::Sampler() => Ok(DescriptorType::Sampler),
        other => {
            engine_bail!(SOURCE, "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

/// Promote a buffer type to its dynamic-offset variant
pub(crate) fn dynamic_variant(descriptor_type: DescriptorType) -> Option<DescriptorType> {
    match descriptor_type {
        DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic => {
            Some(DescriptorType::UniformBufferDynamic)
        }
        DescriptorType::StorageBuffer | DescriptorType::StorageBufferDynamic => {
            Some(DescriptorType::StorageBufferDynamic)
        }
        _ => None,
    }
}

pub(crate) fn binding_table_from_reflected(
    reflected: Vec<ReflectedBinding>,
    dynamic_buffers: &[&str],
) -> Result<BindingTable> {
    let mut entries = Vec::with_capacity(reflected.len());

    for binding in reflected {
        let name = binding
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("set{}_binding{}", binding.set, binding.binding));

        let descriptor_type = if dynamic_buffers.contains(&name.as_str()) {
            match dynamic_variant(binding.descriptor_type) {
                Some(dynamic) => dynamic,
                None => {
                    return Err(Error::InvalidResource(format!(
                        "binding '{}' is {:?} and cannot use a dynamic offset",
                        name, binding.descriptor_type
                    )))
                }
            }
        } else {
            binding.descriptor_type
        };

        entries.push(BindingTableEntry {
            name,
            set: binding.set,
            binding: binding.binding,
            descriptor_type,
            count: binding.count,
            stages: binding.stages,
        });
    }

    if let Some(missing) = dynamic_buffers
        .iter()
        .find(|&&name| !entries.iter().any(|entry| entry.name == name))
    {
        return Err(Error::InvalidResource(format!(
            "dynamic buffer '{}' not found in any shader stage",
            missing
        )));
    }

    BindingTable::from_entries(entries)
}

#[cfg(test)]
#[path = "vulkan_reflection_tests.rs"]
mod tests;

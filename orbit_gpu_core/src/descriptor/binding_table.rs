use crate::error::{Error, Result};
use crate::gpu_device::{DescriptorType, ShaderStageFlags};
use rustc_hash::FxHashMap;

/// Maximum number of descriptor sets a shader effect may use
pub const MAX_DESCRIPTOR_SETS: u32 = 4;

/// Set index reserved for the global bindless table
pub const BINDLESS_SET_INDEX: u32 = 3;

/// One reflected shader binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTableEntry {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size (1 for non-array bindings)
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Name → (set, binding, type) table of a compiled shader effect
///
/// Built once from reflection and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: Vec<BindingTableEntry>,
    by_name: FxHashMap<String, usize>,
    set_count: u32,
}

impl BindingTable {
    /// Build a table from reflected entries
    ///
    /// Entries with the same name, set, binding and type (the same resource
    /// seen from several stages) are merged by OR-ing their stages. Any
    /// other clash is an error.
    pub fn from_entries(entries: impl IntoIterator<Item = BindingTableEntry>) -> Result<Self> {
        let mut table = Self::default();

        for entry in entries {
            if entry.set >= MAX_DESCRIPTOR_SETS {
                return Err(Error::InvalidResource(format!(
                    "binding '{}' uses set {} (max {})",
                    entry.name,
                    entry.set,
                    MAX_DESCRIPTOR_SETS - 1
                )));
            }

            if let Some(&index) = table.by_name.get(&entry.name) {
                let existing = &mut table.entries[index];
                if existing.set != entry.set
                    || existing.binding != entry.binding
                    || existing.descriptor_type != entry.descriptor_type
                {
                    return Err(Error::InvalidResource(format!(
                        "binding '{}' declared as set {} binding {} {:?} and set {} binding {} {:?}",
                        entry.name,
                        existing.set,
                        existing.binding,
                        existing.descriptor_type,
                        entry.set,
                        entry.binding,
                        entry.descriptor_type
                    )));
                }
                existing.stages |= entry.stages;
                existing.count = existing.count.max(entry.count);
                continue;
            }

            if let Some(other) = table
                .entries
                .iter()
                .find(|e| e.set == entry.set && e.binding == entry.binding)
            {
                return Err(Error::InvalidResource(format!(
                    "bindings '{}' and '{}' both use set {} binding {}",
                    other.name, entry.name, entry.set, entry.binding
                )));
            }

            table.set_count = table.set_count.max(entry.set + 1);
            table.by_name.insert(entry.name.clone(), table.entries.len());
            table.entries.push(entry);
        }

        Ok(table)
    }

    pub fn lookup(&self, name: &str) -> Option<&BindingTableEntry> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    pub fn entries(&self) -> &[BindingTableEntry] {
        &self.entries
    }

    /// Entries of one set, sorted by binding index
    pub fn entries_for_set(&self, set: u32) -> Vec<&BindingTableEntry> {
        let mut entries: Vec<&BindingTableEntry> =
            self.entries.iter().filter(|e| e.set == set).collect();
        entries.sort_by_key(|e| e.binding);
        entries
    }

    /// Number of descriptor sets spanned (highest set index + 1, 0 when empty)
    pub fn set_count(&self) -> u32 {
        self.set_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "binding_table_tests.rs"]
mod tests;

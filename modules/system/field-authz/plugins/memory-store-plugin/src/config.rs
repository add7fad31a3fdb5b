use field_authz_sdk::{FilterOperator, Record};
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryStorePluginConfig {
    /// Operators the store accepts in condition trees.
    pub operators: Vec<FilterOperator>,

    /// Records loaded at startup.
    pub records: Vec<Record>,
}

impl Default for MemoryStorePluginConfig {
    fn default() -> Self {
        Self {
            operators: FilterOperator::ALL.to_vec(),
            records: Vec::new(),
        }
    }
}

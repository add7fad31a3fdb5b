use field_authz_sdk::{Group, Identity};
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticAuthorityPluginConfig {
    /// Identity and entitlement records, keyed by `id`.
    pub identities: Vec<Identity>,

    /// Group records, keyed by `id`.
    pub groups: Vec<Group>,
}

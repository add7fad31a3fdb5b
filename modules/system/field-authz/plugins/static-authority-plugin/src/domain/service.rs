//! Service implementation for the static authority plugin.

use std::collections::HashMap;

use anyhow::bail;
use field_authz_sdk::{Group, Identity};

use crate::config::StaticAuthorityPluginConfig;

/// In-memory authority table built once from configuration.
#[derive(Debug, Default)]
pub struct Service {
    identities: HashMap<String, Identity>,
    groups: HashMap<String, Group>,
}

impl Service {
    /// Create a service from plugin configuration.
    ///
    /// # Errors
    ///
    /// Fails on an empty or duplicated identity or group ID.
    pub fn from_config(cfg: &StaticAuthorityPluginConfig) -> anyhow::Result<Self> {
        let mut identities = HashMap::with_capacity(cfg.identities.len());
        for identity in &cfg.identities {
            if identity.id.is_empty() {
                bail!("identity with empty id");
            }
            if identities.insert(identity.id.clone(), identity.clone()).is_some() {
                bail!("duplicate identity id: {}", identity.id);
            }
        }

        let mut groups = HashMap::with_capacity(cfg.groups.len());
        for group in &cfg.groups {
            if group.id.is_empty() {
                bail!("group with empty id");
            }
            if groups.insert(group.id.clone(), group.clone()).is_some() {
                bail!("duplicate group id: {}", group.id);
            }
        }

        tracing::debug!(
            identities = identities.len(),
            groups = groups.len(),
            "static authority table loaded"
        );
        Ok(Self { identities, groups })
    }

    #[must_use]
    pub fn identity(&self, id: &str) -> Option<&Identity> {
        self.identities.get(id)
    }

    #[must_use]
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }
}

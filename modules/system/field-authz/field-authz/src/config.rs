//! Configuration for the field `AuthZ` engine.

use std::path::Path;

use anyhow::Context;
use field_authz_sdk::AuditAction;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides (e.g. `FIELD_AUTHZ_IN_BATCH_SIZE`).
pub const ENV_PREFIX: &str = "FIELD_AUTHZ_";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldAuthzConfig {
    /// Append audit entries for every operation and allow history replay.
    pub audit_enabled: bool,

    /// Maximum number of terms in a single `in`/`notin` leaf.
    pub in_batch_size: usize,

    /// Emit an access-log line for every authorized request.
    pub access_log: bool,

    /// Audit actions fetched for history replay.
    pub history_actions: Vec<AuditAction>,
}

impl Default for FieldAuthzConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            in_batch_size: 100,
            access_log: true,
            history_actions: vec![AuditAction::Create, AuditAction::Update, AuditAction::Delete],
        }
    }
}

impl FieldAuthzConfig {
    /// Layer defaults, an optional YAML file and `FIELD_AUTHZ_*` variables.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or a value does not deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("failed to load field-authz configuration")
    }
}

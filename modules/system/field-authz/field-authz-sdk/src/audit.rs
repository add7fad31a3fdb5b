//! Audit trail models.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{AccessRequest, Identity, QueryFilters, Record};

/// Operation tag of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Get,
    List,
    Search,
}

/// Snapshot of the caller at the time of the operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditActor {
    #[must_use]
    pub fn from_request(identity: &Identity, request: &AccessRequest) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            source_ip: request.source_ip.clone(),
            user_agent: request.user_agent.clone(),
        }
    }
}

/// The record an entry refers to, as `key = value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub key: String,
    pub value: String,
}

impl ResourceKey {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One immutable, append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub actor: AuditActor,
    pub action: AuditAction,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKey>,
    /// Full body for CREATE, field diff for UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Record>,
}

impl AuditEntry {
    /// Start an entry for `request`, stamped now.
    #[must_use]
    pub fn for_request(action: AuditAction, identity: &Identity, request: &AccessRequest) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            actor: AuditActor::from_request(identity, request),
            action,
            method: request.method.clone(),
            path: request.path.clone(),
            query: (!request.query.is_empty()).then(|| request.query.clone()),
            resource: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: ResourceKey) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Record) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A reconstructed record state. `snapshot` is `None` for a deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRevision {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub snapshot: Option<Record>,
}

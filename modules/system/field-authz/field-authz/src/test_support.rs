#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use async_trait::async_trait;
use field_authz_sdk::{
    AccessRequest, AuditAction, AuditEntry, AuditSink, AuthorityClient, Endpoint,
    FieldAuthzError, FilterField, Group, Identity, PermissionBundle, Record, ResourceKey,
};
use serde_json::Value;
use time::OffsetDateTime;

#[must_use]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[must_use]
pub fn bundle_with_endpoint(method: &str, pattern: &str) -> PermissionBundle {
    PermissionBundle {
        endpoints: vec![Endpoint::new(method, pattern)],
        ..PermissionBundle::default()
    }
}

#[must_use]
pub fn group(id: &str, permissions: PermissionBundle) -> Group {
    Group {
        id: id.to_owned(),
        permissions,
    }
}

/// A complete identity with the given endpoint grants and nothing else.
#[must_use]
pub fn identity_with_endpoints(endpoints: &[(&str, &str)]) -> Identity {
    Identity {
        id: "u1".to_owned(),
        username: "jdoe".to_owned(),
        name: "Jane Doe".to_owned(),
        email: "jdoe@example.com".to_owned(),
        groups: Vec::new(),
        permissions: PermissionBundle {
            endpoints: endpoints
                .iter()
                .map(|(method, pattern)| Endpoint::new(*method, *pattern))
                .collect(),
            ..PermissionBundle::default()
        },
    }
}

/// A complete identity allowed on every endpoint, restricted by `read_filters`.
#[must_use]
pub fn identity_with_filters(read_filters: Vec<FilterField>) -> Identity {
    let mut identity = identity_with_endpoints(&[
        ("GET", "^/"),
        ("POST", "^/"),
        ("PUT", "^/"),
        ("DELETE", "^/"),
    ]);
    identity.permissions.read_filters = read_filters;
    identity
}

#[must_use]
pub fn audit_entry(action: AuditAction, at_secs: i64, body: Option<Value>) -> AuditEntry {
    let identity = identity_with_endpoints(&[]);
    let request = AccessRequest::new("POST", "/items", &identity.id);
    let entry = AuditEntry::for_request(action, &identity, &request)
        .with_resource(ResourceKey::new("id", "1"))
        .with_timestamp(OffsetDateTime::from_unix_timestamp(at_secs).unwrap());
    match body {
        Some(body) => entry.with_body(record(body)),
        None => entry,
    }
}

/// Authority table backed by two maps, optionally failing every lookup.
#[derive(Default)]
pub struct MockAuthority {
    identities: HashMap<String, Identity>,
    groups: HashMap<String, Group>,
    fail: bool,
}

impl MockAuthority {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.insert(identity.id.clone(), identity);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.insert(group.id.clone(), group);
        self
    }

    fn check(&self) -> Result<(), FieldAuthzError> {
        if self.fail {
            Err(FieldAuthzError::internal("authority table unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthorityClient for MockAuthority {
    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, FieldAuthzError> {
        self.check()?;
        Ok(self.identities.get(id).cloned())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>, FieldAuthzError> {
        self.check()?;
        Ok(self.groups.get(id).cloned())
    }
}

/// Audit sink whose writes always fail.
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn append(&self, _entry: AuditEntry) -> Result<(), FieldAuthzError> {
        Err(FieldAuthzError::internal("audit table unavailable"))
    }

    async fn query(&self, _key: &str, _value: &str) -> Result<Vec<AuditEntry>, FieldAuthzError> {
        Ok(Vec::new())
    }
}

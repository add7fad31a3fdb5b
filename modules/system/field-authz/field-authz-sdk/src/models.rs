//! Domain models for the field `AuthZ` module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::operators::FilterOperator;

/// A record as seen by the engine: top-level field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Caller-supplied query filters. Each key may carry several values.
pub type QueryFilters = BTreeMap<String, Vec<String>>;

/// A permitted `(method, path-regex)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// HTTP method, matched exactly.
    pub method: String,
    /// Path pattern, matched with search (unanchored) semantics.
    pub endpoint: String,
}

impl Endpoint {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// A row-level restriction: `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterField {
    pub field: String,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Scalar literal, or a JSON-encoded list for `between`/`in`/`notin`.
    pub value: String,
}

impl FilterField {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Selects which filter list of a bundle applies to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterAction {
    #[default]
    Read,
    Create,
    Update,
    Delete,
}

/// Endpoint grants, field restrictions and row filters attached to an identity or group.
///
/// Bundles compose by concatenation only; see [`BundleBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionBundle {
    pub endpoints: Vec<Endpoint>,
    pub read_filters: Vec<FilterField>,
    pub create_filters: Vec<FilterField>,
    pub update_filters: Vec<FilterField>,
    pub delete_filters: Vec<FilterField>,
    /// Never returned, never writable.
    pub excluded_fields: Vec<String>,
    /// Allow-list for updates; empty means unrestricted.
    pub update_permitted_fields: Vec<String>,
    /// Deny-list for updates; always enforced.
    pub update_restricted_fields: Vec<String>,
}

impl PermissionBundle {
    /// The filter list governing `action`.
    #[must_use]
    pub fn filters_for(&self, action: FilterAction) -> &[FilterField] {
        match action {
            FilterAction::Read => &self.read_filters,
            FilterAction::Create => &self.create_filters,
            FilterAction::Update => &self.update_filters,
            FilterAction::Delete => &self.delete_filters,
        }
    }

    /// Whether every grant and restriction of `other` is also present here.
    #[must_use]
    pub fn includes(&self, other: &Self) -> bool {
        fn all_in<T: PartialEq>(ours: &[T], theirs: &[T]) -> bool {
            theirs.iter().all(|item| ours.contains(item))
        }
        all_in(&self.endpoints, &other.endpoints)
            && all_in(&self.read_filters, &other.read_filters)
            && all_in(&self.create_filters, &other.create_filters)
            && all_in(&self.update_filters, &other.update_filters)
            && all_in(&self.delete_filters, &other.delete_filters)
            && all_in(&self.excluded_fields, &other.excluded_fields)
            && all_in(&self.update_permitted_fields, &other.update_permitted_fields)
            && all_in(&self.update_restricted_fields, &other.update_restricted_fields)
    }
}

/// Append-only accumulator for permission bundles.
///
/// The only way to change the accumulated bundle is [`BundleBuilder::absorb`],
/// which concatenates; nothing already absorbed can be removed or overridden.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    bundle: PermissionBundle,
}

impl BundleBuilder {
    #[must_use]
    pub fn new(base: PermissionBundle) -> Self {
        Self { bundle: base }
    }

    /// Concatenate every list of `other` onto the accumulated bundle.
    pub fn absorb(&mut self, other: &PermissionBundle) -> &mut Self {
        let b = &mut self.bundle;
        b.endpoints.extend_from_slice(&other.endpoints);
        b.read_filters.extend_from_slice(&other.read_filters);
        b.create_filters.extend_from_slice(&other.create_filters);
        b.update_filters.extend_from_slice(&other.update_filters);
        b.delete_filters.extend_from_slice(&other.delete_filters);
        b.excluded_fields.extend_from_slice(&other.excluded_fields);
        b.update_permitted_fields
            .extend_from_slice(&other.update_permitted_fields);
        b.update_restricted_fields
            .extend_from_slice(&other.update_restricted_fields);
        self
    }

    #[must_use]
    pub fn build(self) -> PermissionBundle {
        self.bundle
    }
}

/// A resolved caller. Rebuilt from the authority table on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub groups: Vec<String>,
    pub permissions: PermissionBundle,
}

/// A group record from the authority table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub permissions: PermissionBundle,
}

/// Identity attributes observed on the inbound request (e.g. token claims).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservedIdentity {
    pub username: String,
    pub name: String,
    pub email: String,
    /// Authority-table IDs asserted as entitlements.
    pub entitlements: Vec<String>,
}

/// An inbound operation, after transport and credential extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequest {
    pub method: String,
    pub path: String,
    pub query: QueryFilters,
    /// Opaque external identity.
    pub identity_id: String,
    pub observed: Option<ObservedIdentity>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        identity_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            identity_id: identity_id.into(),
            ..Self::default()
        }
    }

    /// Add one value for a query key.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_default().push(value.into());
        self
    }

    #[must_use]
    pub fn observed(mut self, observed: ObservedIdentity) -> Self {
        self.observed = Some(observed);
        self
    }

    #[must_use]
    pub fn client(mut self, source_ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

use std::sync::Arc;

use field_authz_sdk::{
    AuthorityClient, BundleBuilder, FieldAuthzError, Identity, ObservedIdentity,
};
use tracing::{debug, instrument};

/// Resolves an opaque external ID into a fully merged [`Identity`].
///
/// Permissions are merged from three layers by concatenation: the identity's
/// own record, records named as entitlements by the caller, and every group
/// reachable from either.
#[derive(Clone)]
pub struct IdentityResolver {
    authority: Arc<dyn AuthorityClient>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl IdentityResolver {
    #[must_use]
    pub fn new(authority: Arc<dyn AuthorityClient>) -> Self {
        Self { authority }
    }

    /// Resolve `id`, applying freshly observed attributes.
    ///
    /// An identity with no authority record of its own is still authorized
    /// when at least one of its entitlements resolves.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for an empty ID, an identity with neither a record nor
    ///   a resolved entitlement, or a group that does not exist
    /// - authority failures, unchanged
    #[instrument(skip(self, observed), fields(has_observed = observed.is_some()))]
    pub async fn get_user(
        &self,
        id: &str,
        observed: Option<&ObservedIdentity>,
    ) -> Result<Identity, FieldAuthzError> {
        if id.is_empty() {
            return Err(FieldAuthzError::unauthorized("identity id is required"));
        }

        let stored = self.authority.get_identity(id).await?;
        let is_user = stored.is_some();
        let mut identity = stored.unwrap_or_else(|| Identity {
            id: id.to_owned(),
            ..Identity::default()
        });
        let mut bundle = BundleBuilder::new(std::mem::take(&mut identity.permissions));

        let entitlement_ids = observed
            .map(|o| o.entitlements.as_slice())
            .filter(|ids| !ids.is_empty());

        let mut entitled_groups = Vec::new();
        let mut resolved_entitlements = Vec::new();
        if let Some(ids) = entitlement_ids {
            for entitlement in self.authority.get_identities(ids).await? {
                bundle.absorb(&entitlement.permissions);
                entitled_groups.extend(entitlement.groups.iter().cloned());
                resolved_entitlements.push(entitlement.id);
            }
            debug!(
                requested = ids.len(),
                resolved = resolved_entitlements.len(),
                "entitlements resolved"
            );
        }

        if !is_user && resolved_entitlements.is_empty() {
            debug!("no authority record and no entitlement");
            return Err(FieldAuthzError::unauthorized("identity is not authorized"));
        }

        let mut group_ids: Vec<String> = Vec::new();
        for group_id in identity.groups.iter().chain(&entitled_groups) {
            if !group_ids.contains(group_id) {
                group_ids.push(group_id.clone());
            }
        }
        for group_id in &group_ids {
            let Some(group) = self.authority.get_group(group_id).await? else {
                debug!(group = %group_id, "group lookup missed");
                return Err(FieldAuthzError::unauthorized(format!(
                    "group {group_id} does not exist"
                )));
            };
            bundle.absorb(&group.permissions);
        }
        identity.permissions = bundle.build();

        if let Some(observed) = observed {
            override_non_empty(&mut identity.username, &observed.username);
            override_non_empty(&mut identity.name, &observed.name);
            override_non_empty(&mut identity.email, &observed.email);
        }

        if entitlement_ids.is_some() {
            let mut effective = resolved_entitlements;
            for group_id in entitled_groups {
                if !effective.contains(&group_id) {
                    effective.push(group_id);
                }
            }
            identity.groups = effective;
        }

        Ok(identity)
    }
}

fn override_non_empty(target: &mut String, observed: &str) {
    if !observed.is_empty() {
        observed.clone_into(target);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{MockAuthority, bundle_with_endpoint, group};
    use field_authz_sdk::{Endpoint, ErrorKind, PermissionBundle};

    fn member(id: &str, groups: &[&str], bundle: PermissionBundle) -> Identity {
        Identity {
            id: id.to_owned(),
            username: format!("{id}-login"),
            name: format!("{id} name"),
            email: format!("{id}@example.com"),
            groups: groups.iter().map(|g| (*g).to_owned()).collect(),
            permissions: bundle,
        }
    }

    fn observed(entitlements: &[&str]) -> ObservedIdentity {
        ObservedIdentity {
            entitlements: entitlements.iter().map(|e| (*e).to_owned()).collect(),
            ..ObservedIdentity::default()
        }
    }

    #[tokio::test]
    async fn empty_id_is_unauthorized() {
        let resolver = IdentityResolver::new(Arc::new(MockAuthority::default()));
        let err = resolver.get_user("", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn unknown_identity_without_entitlements_is_rejected() {
        let resolver = IdentityResolver::new(Arc::new(MockAuthority::default()));
        let err = resolver.get_user("ghost", None).await.unwrap_err();
        assert_eq!(err, FieldAuthzError::unauthorized("identity is not authorized"));
    }

    #[tokio::test]
    async fn group_permissions_are_merged() {
        let authority = MockAuthority::default()
            .with_identity(member("u1", &["readers"], bundle_with_endpoint("GET", "^/own")))
            .with_group(group("readers", bundle_with_endpoint("GET", "^/items")));
        let resolver = IdentityResolver::new(Arc::new(authority));

        let identity = resolver.get_user("u1", None).await.unwrap();

        assert_eq!(
            identity.permissions.endpoints,
            vec![Endpoint::new("GET", "^/own"), Endpoint::new("GET", "^/items")]
        );
        assert_eq!(identity.groups, vec!["readers".to_owned()]);
    }

    #[tokio::test]
    async fn missing_group_is_named() {
        let authority = MockAuthority::default()
            .with_identity(member("u1", &["nope"], PermissionBundle::default()));
        let resolver = IdentityResolver::new(Arc::new(authority));

        let err = resolver.get_user("u1", None).await.unwrap_err();
        assert_eq!(err, FieldAuthzError::unauthorized("group nope does not exist"));
    }

    #[tokio::test]
    async fn entitlement_alone_authorizes() {
        let authority = MockAuthority::default().with_identity(member(
            "ent-admin",
            &[],
            bundle_with_endpoint("DELETE", "^/items"),
        ));
        let resolver = IdentityResolver::new(Arc::new(authority));
        let attrs = ObservedIdentity {
            username: "jdoe".to_owned(),
            ..observed(&["ent-admin", "ent-missing"])
        };

        let identity = resolver.get_user("ext-42", Some(&attrs)).await.unwrap();

        assert_eq!(identity.id, "ext-42");
        assert_eq!(identity.username, "jdoe");
        assert_eq!(identity.groups, vec!["ent-admin".to_owned()]);
        assert_eq!(identity.permissions.endpoints, vec![Endpoint::new("DELETE", "^/items")]);
    }

    #[tokio::test]
    async fn entitlements_replace_effective_groups_but_keep_permissions() {
        let authority = MockAuthority::default()
            .with_identity(member("u1", &["stored"], PermissionBundle::default()))
            .with_identity(member("ent", &["carried"], PermissionBundle::default()))
            .with_group(group("stored", bundle_with_endpoint("GET", "^/stored")))
            .with_group(group("carried", bundle_with_endpoint("GET", "^/carried")));
        let resolver = IdentityResolver::new(Arc::new(authority));

        let identity = resolver.get_user("u1", Some(&observed(&["ent"]))).await.unwrap();

        assert_eq!(identity.groups, vec!["ent".to_owned(), "carried".to_owned()]);
        let paths: Vec<_> = identity
            .permissions
            .endpoints
            .iter()
            .map(|e| e.endpoint.as_str())
            .collect();
        assert!(paths.contains(&"^/stored"));
        assert!(paths.contains(&"^/carried"));
    }

    #[tokio::test]
    async fn observed_attributes_override_only_when_present() {
        let authority = MockAuthority::default()
            .with_identity(member("u1", &[], PermissionBundle::default()));
        let resolver = IdentityResolver::new(Arc::new(authority));
        let attrs = ObservedIdentity {
            email: "new@example.com".to_owned(),
            ..ObservedIdentity::default()
        };

        let identity = resolver.get_user("u1", Some(&attrs)).await.unwrap();

        assert_eq!(identity.email, "new@example.com");
        assert_eq!(identity.username, "u1-login");
        assert!(identity.groups.is_empty());
    }

    #[tokio::test]
    async fn repeated_resolution_is_stable() {
        let authority = MockAuthority::default()
            .with_identity(member("u1", &["a", "b"], bundle_with_endpoint("GET", "^/x")))
            .with_group(group("a", bundle_with_endpoint("GET", "^/a")))
            .with_group(group("b", bundle_with_endpoint("POST", "^/b")));
        let resolver = IdentityResolver::new(Arc::new(authority));

        let first = resolver.get_user("u1", None).await.unwrap();
        let second = resolver.get_user("u1", None).await.unwrap();

        assert!(first.permissions.includes(&second.permissions));
        assert!(second.permissions.includes(&first.permissions));
    }

    #[tokio::test]
    async fn group_merge_is_monotonic() {
        let own = bundle_with_endpoint("GET", "^/own");
        let authority = MockAuthority::default()
            .with_identity(member("u1", &["g"], own.clone()))
            .with_group(group("g", bundle_with_endpoint("PUT", "^/g")));
        let resolver = IdentityResolver::new(Arc::new(authority));

        let identity = resolver.get_user("u1", None).await.unwrap();
        assert!(identity.permissions.includes(&own));
    }

    #[tokio::test]
    async fn authority_failure_is_propagated() {
        let resolver = IdentityResolver::new(Arc::new(MockAuthority::failing()));
        let err = resolver.get_user("u1", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

//! Request gate.
//!
//! Decides whether a resolved identity may call a method/path at all, before
//! any row filter is compiled.

use std::sync::Arc;

use field_authz_sdk::{AccessRequest, AuthorityClient, FieldAuthzError, Identity};
use regex::RegexSet;
use tracing::{debug, info, instrument};

use super::resolver::IdentityResolver;

/// Whether any endpoint grant of `identity` matches `method` exactly and
/// `path` by unanchored search.
///
/// # Errors
///
/// `BadRequest` if a grant's path pattern does not compile.
pub fn endpoint_allowed(
    identity: &Identity,
    method: &str,
    path: &str,
) -> Result<bool, FieldAuthzError> {
    let endpoints = &identity.permissions.endpoints;
    let patterns = compile_patterns(identity)?;
    Ok(patterns
        .matches(path)
        .into_iter()
        .any(|idx| endpoints[idx].method == method))
}

fn compile_patterns(identity: &Identity) -> Result<RegexSet, FieldAuthzError> {
    RegexSet::new(identity.permissions.endpoints.iter().map(|e| &e.endpoint))
        .map_err(|e| FieldAuthzError::bad_request(format!("invalid endpoint pattern: {e}")))
}

/// Identity resolution plus endpoint authorization.
#[derive(Debug, Clone)]
pub struct RequestGate {
    resolver: IdentityResolver,
    access_log: bool,
}

impl RequestGate {
    #[must_use]
    pub fn new(authority: Arc<dyn AuthorityClient>) -> Self {
        Self {
            resolver: IdentityResolver::new(authority),
            access_log: true,
        }
    }

    #[must_use]
    pub fn with_access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Resolve, validate and authorize `request`, returning its identity.
    ///
    /// # Errors
    ///
    /// The first failure of resolution, [`Self::validate_user`] or
    /// [`Self::validate_request`].
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn initialize_request(
        &self,
        request: &AccessRequest,
    ) -> Result<Identity, FieldAuthzError> {
        let identity = self.resolve(request).await?;
        self.validate_request(request, &identity)?;
        Ok(identity)
    }

    /// Check that the identity's grants compile and its profile is complete.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an invalid endpoint pattern, `Unauthorized` when ID,
    /// username, name or email is empty.
    pub fn validate_user(&self, identity: &Identity) -> Result<(), FieldAuthzError> {
        compile_patterns(identity)?;

        let missing = [
            ("id", &identity.id),
            ("username", &identity.username),
            ("name", &identity.name),
            ("email", &identity.email),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        match missing {
            Some((attr, _)) => Err(FieldAuthzError::unauthorized(format!(
                "identity has no {attr}"
            ))),
            None => Ok(()),
        }
    }

    /// Endpoint authorization.
    ///
    /// A supplied `request` is authoritative: its identity is re-resolved and
    /// re-validated and `identity` is ignored.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when neither an identity nor a request is supplied;
    /// resolution and validation failures otherwise.
    pub async fn can_access_endpoint(
        &self,
        method: &str,
        path: &str,
        identity: Option<&Identity>,
        request: Option<&AccessRequest>,
    ) -> Result<bool, FieldAuthzError> {
        match (request, identity) {
            (Some(request), _) => {
                let resolved = self.resolve(request).await?;
                endpoint_allowed(&resolved, method, path)
            }
            (None, Some(identity)) => endpoint_allowed(identity, method, path),
            (None, None) => Err(FieldAuthzError::unauthorized("no identity supplied")),
        }
    }

    /// Authorize `request` for an already resolved `identity`.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the request is denied and carries an empty query key or
    /// value, `Forbidden` if it is denied otherwise.
    pub fn validate_request(
        &self,
        request: &AccessRequest,
        identity: &Identity,
    ) -> Result<(), FieldAuthzError> {
        if endpoint_allowed(identity, &request.method, &request.path)? {
            if self.access_log {
                info!(
                    user = %identity.username,
                    name = %identity.name,
                    method = %request.method,
                    path = %request.path,
                    source_ip = request.source_ip.as_deref().unwrap_or("-"),
                    "{} ({}) accessed {} {}",
                    identity.name,
                    identity.username,
                    request.method,
                    request.path
                );
            }
            return Ok(());
        }

        let malformed = request
            .query
            .iter()
            .any(|(key, values)| key.is_empty() || values.iter().any(String::is_empty));
        if malformed {
            return Err(FieldAuthzError::bad_request(
                "query strings must have keys and values",
            ));
        }

        debug!(user = %identity.id, "endpoint denied");
        Err(FieldAuthzError::Forbidden {
            method: request.method.clone(),
            path: request.path.clone(),
        })
    }

    async fn resolve(&self, request: &AccessRequest) -> Result<Identity, FieldAuthzError> {
        let identity = self
            .resolver
            .get_user(&request.identity_id, request.observed.as_ref())
            .await?;
        self.validate_user(&identity)?;
        Ok(identity)
    }
}

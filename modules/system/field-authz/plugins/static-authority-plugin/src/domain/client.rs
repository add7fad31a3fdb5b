//! Client implementation for the static authority plugin.

use async_trait::async_trait;
use field_authz_sdk::{AuthorityClient, FieldAuthzError, Group, Identity};

use super::service::Service;

#[async_trait]
impl AuthorityClient for Service {
    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, FieldAuthzError> {
        Ok(self.identity(id).cloned())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>, FieldAuthzError> {
        Ok(self.group(id).cloned())
    }
}

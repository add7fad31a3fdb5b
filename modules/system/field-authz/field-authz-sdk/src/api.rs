//! Collaborator contracts consumed by the field `AuthZ` engine.
//!
//! Implementations live in plugins. Absence is a distinct, non-error outcome
//! (`Ok(None)`); any `Err` is surfaced to the caller unchanged and never
//! retried by the engine.

use async_trait::async_trait;

use crate::audit::AuditEntry;
use crate::condition::Condition;
use crate::error::FieldAuthzError;
use crate::models::{Group, Identity, Record};
use crate::operators::OperatorTable;

/// Authority table for identities and groups.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Look up an identity (or entitlement) record by ID.
    ///
    /// # Errors
    ///
    /// Store failures only; a missing record is `Ok(None)`.
    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, FieldAuthzError>;

    /// Look up a group by ID.
    ///
    /// # Errors
    ///
    /// Store failures only; a missing group is `Ok(None)`.
    async fn get_group(&self, id: &str) -> Result<Option<Group>, FieldAuthzError>;

    /// Batch lookup; IDs with no record are omitted from the result.
    ///
    /// # Errors
    ///
    /// Store failures only.
    async fn get_identities(&self, ids: &[String]) -> Result<Vec<Identity>, FieldAuthzError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(identity) = self.get_identity(id).await? {
                found.push(identity);
            }
        }
        Ok(found)
    }
}

/// Backend operator table emitting condition leaves.
pub type QueryOperators = dyn OperatorTable<Output = Condition> + Send + Sync;

/// Keyed record storage that executes compiled condition trees.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Operators this backend can translate.
    fn operators(&self) -> &QueryOperators;

    /// Records matching `condition` (all records when `None`).
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn find(&self, condition: Option<&Condition>) -> Result<Vec<Record>, FieldAuthzError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn insert(&self, record: Record) -> Result<Record, FieldAuthzError>;

    /// Apply `patch` to the records matching `condition`; returns the first
    /// updated record, or `None` when nothing matched.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn update(
        &self,
        condition: &Condition,
        patch: &Record,
    ) -> Result<Option<Record>, FieldAuthzError>;

    /// Delete the records matching `condition`; returns whether any matched.
    ///
    /// # Errors
    ///
    /// Store failures.
    async fn delete(&self, condition: &Condition) -> Result<bool, FieldAuthzError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// # Errors
    ///
    /// Sink failures; callers log and swallow them.
    async fn append(&self, entry: AuditEntry) -> Result<(), FieldAuthzError>;

    /// Entries whose resource is `key = value`, in no particular order.
    ///
    /// # Errors
    ///
    /// Sink failures.
    async fn query(&self, key: &str, value: &str) -> Result<Vec<AuditEntry>, FieldAuthzError>;
}

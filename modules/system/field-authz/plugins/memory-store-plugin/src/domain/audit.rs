use async_trait::async_trait;
use field_authz_sdk::{AuditEntry, AuditSink, FieldAuthzError};
use parking_lot::RwLock;

/// Append-only audit trail kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry appended so far, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), FieldAuthzError> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn query(&self, key: &str, value: &str) -> Result<Vec<AuditEntry>, FieldAuthzError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| {
                e.resource
                    .as_ref()
                    .is_some_and(|r| r.key == key && r.value == value)
            })
            .cloned()
            .collect())
    }
}

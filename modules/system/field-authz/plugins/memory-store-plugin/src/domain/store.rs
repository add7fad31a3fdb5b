use async_trait::async_trait;
use field_authz_sdk::{
    Condition, FieldAuthzError, FilterOperator, LeafBuilder, QueryOperators, Record,
    RecordEvaluator, RecordStore,
};
use parking_lot::RwLock;

use crate::config::MemoryStorePluginConfig;

/// Record store over a vector of JSON objects.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    operators: LeafBuilder,
    records: RwLock<Vec<Record>>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(cfg: &MemoryStorePluginConfig) -> Self {
        Self {
            operators: LeafBuilder::only(&cfg.operators),
            records: RwLock::new(cfg.records.clone()),
        }
    }

    /// Restrict the operators accepted in condition trees.
    #[must_use]
    pub fn with_operators(mut self, ops: &[FilterOperator]) -> Self {
        self.operators = LeafBuilder::only(ops);
        self
    }

    #[must_use]
    pub fn with_records(self, records: Vec<Record>) -> Self {
        *self.records.write() = records;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn matches(condition: Option<&Condition>, record: &Record) -> Result<bool, FieldAuthzError> {
    match condition {
        Some(condition) => Ok(condition.evaluate(&RecordEvaluator::new(record))?),
        None => Ok(true),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn operators(&self) -> &QueryOperators {
        &self.operators
    }

    async fn find(&self, condition: Option<&Condition>) -> Result<Vec<Record>, FieldAuthzError> {
        let records = self.records.read();
        let mut found = Vec::new();
        for record in records.iter() {
            if matches(condition, record)? {
                found.push(record.clone());
            }
        }
        Ok(found)
    }

    async fn insert(&self, record: Record) -> Result<Record, FieldAuthzError> {
        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        condition: &Condition,
        patch: &Record,
    ) -> Result<Option<Record>, FieldAuthzError> {
        let mut records = self.records.write();
        let mut first = None;
        for record in records.iter_mut() {
            if !matches(Some(condition), record)? {
                continue;
            }
            for (field, value) in patch {
                record.insert(field.clone(), value.clone());
            }
            if first.is_none() {
                first = Some(record.clone());
            }
        }
        Ok(first)
    }

    async fn delete(&self, condition: &Condition) -> Result<bool, FieldAuthzError> {
        let mut records = self.records.write();
        let mut keep = Vec::with_capacity(records.len());
        for record in records.iter() {
            keep.push(!matches(Some(condition), record)?);
        }

        let before = records.len();
        let mut flags = keep.into_iter();
        records.retain(|_| flags.next().unwrap_or(true));
        let removed = before - records.len();
        tracing::debug!(removed, "records deleted");
        Ok(removed > 0)
    }
}

//! Local evaluator: filters judged against a literal record.
//!
//! Used at creation time, when there is no stored record to query yet.

use field_authz_sdk::{FieldAuthzError, FilterField, QueryFilters, Record, RecordEvaluator};

use super::filtering::Filtering;

/// Boolean compiler over one candidate record that remembers which top-level
/// fields made it fail.
#[derive(Debug)]
pub struct LocalFiltering<'r> {
    evaluator: RecordEvaluator<'r>,
    failed: Vec<String>,
}

impl<'r> LocalFiltering<'r> {
    #[must_use]
    pub fn new(record: &'r Record) -> Self {
        Self {
            evaluator: RecordEvaluator::new(record),
            failed: Vec::new(),
        }
    }

    /// Evaluate permission filter fields; an empty list accepts.
    ///
    /// # Errors
    ///
    /// `BadRequest` for malformed filter values.
    pub fn user_filters(&mut self, fields: &[FilterField]) -> Result<bool, FieldAuthzError> {
        let failed = &mut self.failed;
        let accepted = Filtering::new(&self.evaluator)
            .user_filters_observed(fields, |field, ok| note_failure(failed, field, *ok))?;
        Ok(accepted.unwrap_or(true))
    }

    /// Evaluate caller query filters; an empty map accepts.
    ///
    /// # Errors
    ///
    /// `BadRequest` for unsupported operators and malformed filter values.
    pub fn filter(&mut self, query: &QueryFilters) -> Result<bool, FieldAuthzError> {
        let failed = &mut self.failed;
        let accepted = Filtering::new(&self.evaluator)
            .filter_observed(None, query, |field, ok| note_failure(failed, field, *ok))?;
        Ok(accepted.unwrap_or(true))
    }

    /// Fields that failed so far, in evaluation order, each once.
    #[must_use]
    pub fn failed_fields(&self) -> &[String] {
        &self.failed
    }

    #[must_use]
    pub fn into_failed_fields(self) -> Vec<String> {
        self.failed
    }
}

fn note_failure(failed: &mut Vec<String>, field: &str, ok: bool) {
    if !ok && !failed.iter().any(|f| f == field) {
        failed.push(field.to_owned());
    }
}

//! Predicate compiler.
//!
//! [`Filtering`] folds permission-bundle filter fields and caller query
//! filters into one result through a backend [`OperatorTable`]. With a
//! query-building table the result is a [`Condition`](field_authz_sdk::Condition);
//! with the record evaluator it is a `bool`.

use field_authz_sdk::operators::{and_into, literal, or_into};
use field_authz_sdk::{
    FieldAuthzError, FilterAction, FilterField, FilterOperator, Identity, OperatorTable,
    QueryFilters, parse_magic_key,
};
use serde_json::Value;

/// Compiler over one operator table.
pub struct Filtering<'t, T: OperatorTable + ?Sized> {
    table: &'t T,
}

impl<'t, T: OperatorTable + ?Sized> Filtering<'t, T> {
    #[must_use]
    pub fn new(table: &'t T) -> Self {
        Self { table }
    }

    /// Compile the identity's filters for `action`, then AND the query filters.
    ///
    /// Without an identity only the query filters apply.
    ///
    /// # Errors
    ///
    /// `BadRequest` for unsupported operators and malformed values.
    pub fn filter_for(
        &self,
        identity: Option<&Identity>,
        query: &QueryFilters,
        action: FilterAction,
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        let conditions = match identity {
            Some(identity) => self.user_filters(identity.permissions.filters_for(action))?,
            None => None,
        };
        self.filter(conditions, query)
    }

    /// Compile a permission bundle's filter list.
    ///
    /// Entries on the same field are alternatives (OR); different fields are
    /// all required (AND).
    ///
    /// # Errors
    ///
    /// `BadRequest` for unsupported operators and malformed values.
    pub fn user_filters(&self, fields: &[FilterField]) -> Result<Option<T::Output>, FieldAuthzError> {
        self.user_filters_observed(fields, |_, _| {})
    }

    /// [`Self::user_filters`], reporting each field's aggregate to `observe`.
    pub(crate) fn user_filters_observed(
        &self,
        fields: &[FilterField],
        mut observe: impl FnMut(&str, &T::Output),
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        let mut conditions = None;
        for (field, entries) in group_by_field(fields) {
            let group = match entries.as_slice() {
                [single] => self.table.apply(single.operator, field, &single.value)?,
                many => self.any_of(field, many.iter().map(|f| (f.operator, f.value.as_str())))?,
            };
            observe(field, &group);
            conditions = Some(and_into(conditions, group));
        }
        Ok(conditions)
    }

    /// AND caller query filters into `conditions`.
    ///
    /// Several values under one key are alternatives (OR); distinct keys are
    /// all required (AND). Keys without values are ignored.
    ///
    /// # Errors
    ///
    /// `BadRequest` for unsupported operators and malformed values.
    pub fn filter(
        &self,
        conditions: Option<T::Output>,
        query: &QueryFilters,
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        self.filter_observed(conditions, query, |_, _| {})
    }

    pub(crate) fn filter_observed(
        &self,
        mut conditions: Option<T::Output>,
        query: &QueryFilters,
        mut observe: impl FnMut(&str, &T::Output),
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        for (key, values) in query {
            let (field, op) = parse_magic_key(key);
            let group = match values.as_slice() {
                [] => continue,
                [single] => self.perform_filter(None, key, single)?,
                many => Some(self.any_of(field, many.iter().map(|v| (op, v.as_str())))?),
            };
            if let Some(group) = group {
                observe(field, &group);
                conditions = Some(and_into(conditions, group));
            }
        }
        Ok(conditions)
    }

    /// Parse the magic operator from `key`, apply it, and AND the leaf in.
    ///
    /// # Errors
    ///
    /// `BadRequest` naming the operator if the table does not support it.
    pub fn perform_filter(
        &self,
        conditions: Option<T::Output>,
        key: &str,
        value: &str,
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        let (field, op) = parse_magic_key(key);
        let leaf = self.table.apply(op, field, value)?;
        Ok(Some(and_into(conditions, leaf)))
    }

    /// Default read filters AND `field IN values`.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the backend does not support `in`.
    pub fn multi_filter(
        &self,
        identity: &Identity,
        field: &str,
        values: &[Value],
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        let conditions = self.user_filters(identity.permissions.filters_for(FilterAction::Read))?;
        let encoded = encode_list(values)?;
        let leaf = self.table.is_in(field, &encoded)?;
        Ok(Some(and_into(conditions, leaf)))
    }

    /// Membership over an arbitrarily long list, split into `in`/`notin`
    /// leaves of at most `batch_size` terms.
    ///
    /// Batches are `ORed` for membership and `ANDed` for negation. A batch
    /// holding a single value compiles to `eq` (`ne`). Returns `None` for an
    /// empty list.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a zero batch size or unsupported operators.
    pub fn batched_in(
        &self,
        field: &str,
        values: &[Value],
        batch_size: usize,
        negate: bool,
    ) -> Result<Option<T::Output>, FieldAuthzError> {
        if batch_size == 0 {
            return Err(FieldAuthzError::bad_request("batch size must be positive"));
        }

        let mut conditions = None;
        for batch in values.chunks(batch_size) {
            let part = match (batch, negate) {
                ([single], false) => self.table.eq(field, &literal(single))?,
                ([single], true) => self.table.ne(field, &literal(single))?,
                (many, false) => self.table.is_in(field, &encode_list(many)?)?,
                (many, true) => self.table.not_in(field, &encode_list(many)?)?,
            };
            conditions = Some(if negate {
                and_into(conditions, part)
            } else {
                or_into(conditions, part)
            });
        }
        Ok(conditions)
    }

    fn any_of<'v>(
        &self,
        field: &str,
        alternatives: impl Iterator<Item = (FilterOperator, &'v str)>,
    ) -> Result<T::Output, FieldAuthzError> {
        let mut group = None;
        for (op, value) in alternatives {
            group = Some(or_into(group, self.table.apply(op, field, value)?));
        }
        group.ok_or_else(|| FieldAuthzError::internal(format!("empty filter group for {field}")))
    }
}

/// Group filter fields by name, keeping first-appearance order.
fn group_by_field(fields: &[FilterField]) -> Vec<(&str, Vec<&FilterField>)> {
    let mut groups: Vec<(&str, Vec<&FilterField>)> = Vec::new();
    for f in fields {
        match groups.iter_mut().find(|(name, _)| *name == f.field) {
            Some((_, entries)) => entries.push(f),
            None => groups.push((f.field.as_str(), vec![f])),
        }
    }
    groups
}

fn encode_list(values: &[Value]) -> Result<String, FieldAuthzError> {
    serde_json::to_string(values)
        .map_err(|e| FieldAuthzError::internal(format!("failed to encode filter values: {e}")))
}

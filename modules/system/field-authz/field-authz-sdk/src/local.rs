//! In-memory operator table.
//!
//! [`RecordEvaluator`] judges a literal record instead of emitting a
//! predicate. It backs the local evaluator used at creation time and the
//! in-memory record store.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::models::Record;
use crate::operators::{FilterOperator, OperatorError, OperatorTable, literal, parse_exists, parse_list};

/// Operator table evaluating filters against one record.
#[derive(Debug, Clone, Copy)]
pub struct RecordEvaluator<'r> {
    record: &'r Record,
}

impl<'r> RecordEvaluator<'r> {
    #[must_use]
    pub fn new(record: &'r Record) -> Self {
        Self { record }
    }

    fn field(&self, field: &str) -> Option<&'r Value> {
        self.record.get(field)
    }

    fn ordered(&self, field: &str, value: &str, accept: fn(Ordering) -> bool) -> bool {
        self.field(field)
            .and_then(|actual| compare(actual, value))
            .is_some_and(accept)
    }
}

/// Equality between a record value and a filter literal.
fn matches_literal(actual: &Value, literal: &str) -> bool {
    match actual {
        Value::String(s) => s == literal,
        Value::Number(_) => compare(actual, literal) == Some(Ordering::Equal),
        Value::Bool(b) => literal.parse::<bool>().is_ok_and(|l| l == *b),
        Value::Null => literal == "null",
        Value::Array(items) => items.iter().any(|item| matches_literal(item, literal)),
        Value::Object(_) => false,
    }
}

/// Order a record value against a literal: numerically for numbers,
/// lexicographically for strings.
fn compare(actual: &Value, literal: &str) -> Option<Ordering> {
    match actual {
        Value::String(s) => Some(s.as_str().cmp(literal)),
        Value::Number(n) => compare_number(n, literal),
        _ => None,
    }
}

/// Integers compare exactly; `f64` is used only when either side is a float.
fn compare_number(n: &Number, literal: &str) -> Option<Ordering> {
    let integer = n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
    if let (Some(actual), Ok(expected)) = (integer, literal.parse::<i128>()) {
        return Some(actual.cmp(&expected));
    }
    n.as_f64()?.partial_cmp(&literal.parse::<f64>().ok()?)
}

fn contains_literal(actual: &Value, literal: &str) -> bool {
    match actual {
        Value::String(s) => s.contains(literal),
        Value::Array(items) => items.iter().any(|item| matches_literal(item, literal)),
        _ => false,
    }
}

impl OperatorTable for RecordEvaluator<'_> {
    type Output = bool;

    fn eq(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self
            .field(field)
            .is_some_and(|actual| matches_literal(actual, value)))
    }

    fn ne(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(!self.eq(field, value)?)
    }

    fn starts_with(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(matches!(self.field(field), Some(Value::String(s)) if s.starts_with(value)))
    }

    fn contains(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self
            .field(field)
            .is_some_and(|actual| contains_literal(actual, value)))
    }

    fn not_contains(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(!self.contains(field, value)?)
    }

    fn exists(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self.field(field).is_some() == parse_exists(value)?)
    }

    fn gt(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self.ordered(field, value, Ordering::is_gt))
    }

    fn gte(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self.ordered(field, value, Ordering::is_ge))
    }

    fn lt(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self.ordered(field, value, Ordering::is_lt))
    }

    fn lte(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        Ok(self.ordered(field, value, Ordering::is_le))
    }

    fn between(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        let bounds = parse_list(FilterOperator::Between, value)?;
        let (low, high) = (literal(&bounds[0]), literal(&bounds[1]));
        Ok(self.ordered(field, &low, Ordering::is_ge) && self.ordered(field, &high, Ordering::is_le))
    }

    fn is_in(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        let candidates = parse_list(FilterOperator::In, value)?;
        Ok(self.field(field).is_some_and(|actual| {
            candidates
                .iter()
                .any(|candidate| matches_literal(actual, &literal(candidate)))
        }))
    }

    fn not_in(&self, field: &str, value: &str) -> Result<bool, OperatorError> {
        let candidates = parse_list(FilterOperator::NotIn, value)?;
        Ok(!self.field(field).is_some_and(|actual| {
            candidates
                .iter()
                .any(|candidate| matches_literal(actual, &literal(candidate)))
        }))
    }
}

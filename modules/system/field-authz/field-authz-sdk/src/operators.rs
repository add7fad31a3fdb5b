//! Magic operators and the per-backend operator table contract.
//!
//! A filter key is either `field` or `field__operator`. The operator selects
//! one method of an [`OperatorTable`]; each backend implements the methods it
//! supports and leaves the rest to the default, which reports
//! [`OperatorError::Unsupported`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between field name and magic operator in a filter key.
pub const MAGIC_SEPARATOR: &str = "__";

/// Comparison selected by a magic operator suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    StartsWith,
    Contains,
    NotContains,
    Exists,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    NotIn,
}

impl FilterOperator {
    pub const ALL: [Self; 13] = [
        Self::Eq,
        Self::Ne,
        Self::StartsWith,
        Self::Contains,
        Self::NotContains,
        Self::Exists,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Between,
        Self::In,
        Self::NotIn,
    ];

    /// Magic suffix for this operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::StartsWith => "startswith",
            Self::Contains => "contains",
            Self::NotContains => "notcontains",
            Self::Exists => "exists",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "notin",
        }
    }

    /// Operators whose value is a JSON-encoded list.
    #[must_use]
    pub fn takes_list(self) -> bool {
        matches!(self, Self::Between | Self::In | Self::NotIn)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| OperatorError::Unknown(s.to_owned()))
    }
}

/// Failure raised by an operator table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperatorError {
    #[error("unknown operator: {0}")]
    Unknown(String),

    #[error("unsupported operator: {0}")]
    Unsupported(FilterOperator),

    #[error("invalid value for operator {op}: {reason}")]
    InvalidValue { op: FilterOperator, reason: String },
}

/// Split a filter key into `(field, operator)`.
///
/// Only a known operator after the last separator is split off; any other
/// key, separators included, names a field compared with equality.
#[must_use]
pub fn parse_magic_key(key: &str) -> (&str, FilterOperator) {
    key.rsplit_once(MAGIC_SEPARATOR)
        .filter(|(field, _)| !field.is_empty())
        .and_then(|(field, op)| op.parse().ok().map(|op| (field, op)))
        .unwrap_or((key, FilterOperator::Eq))
}

/// AND/OR composition over an operator table's output.
pub trait Combine: Sized {
    #[must_use]
    fn and(self, other: Self) -> Self;
    #[must_use]
    fn or(self, other: Self) -> Self;
}

impl Combine for bool {
    fn and(self, other: Self) -> Self {
        self && other
    }

    fn or(self, other: Self) -> Self {
        self || other
    }
}

/// AND `next` into an optional running result; an absent left side is the identity.
pub fn and_into<T: Combine>(acc: Option<T>, next: T) -> T {
    match acc {
        Some(acc) => acc.and(next),
        None => next,
    }
}

/// OR `next` into an optional running result; an absent left side is the identity.
pub fn or_into<T: Combine>(acc: Option<T>, next: T) -> T {
    match acc {
        Some(acc) => acc.or(next),
        None => next,
    }
}

type OpResult<T> = Result<T, OperatorError>;

/// Per-backend operator table.
///
/// Query-building tables produce condition leaves, the in-memory table
/// produces booleans. Every method defaults to unsupported.
pub trait OperatorTable {
    type Output: Combine;

    fn eq(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Eq)
    }

    fn ne(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Ne)
    }

    fn starts_with(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::StartsWith)
    }

    fn contains(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Contains)
    }

    fn not_contains(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::NotContains)
    }

    fn exists(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Exists)
    }

    fn gt(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Gt)
    }

    fn gte(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Gte)
    }

    fn lt(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Lt)
    }

    fn lte(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Lte)
    }

    fn between(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::Between)
    }

    fn is_in(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::In)
    }

    fn not_in(&self, _field: &str, _value: &str) -> OpResult<Self::Output> {
        unsupported(FilterOperator::NotIn)
    }

    /// Dispatch `op` to the matching method.
    ///
    /// # Errors
    ///
    /// Propagates the operator's own failure.
    fn apply(&self, op: FilterOperator, field: &str, value: &str) -> OpResult<Self::Output> {
        match op {
            FilterOperator::Eq => self.eq(field, value),
            FilterOperator::Ne => self.ne(field, value),
            FilterOperator::StartsWith => self.starts_with(field, value),
            FilterOperator::Contains => self.contains(field, value),
            FilterOperator::NotContains => self.not_contains(field, value),
            FilterOperator::Exists => self.exists(field, value),
            FilterOperator::Gt => self.gt(field, value),
            FilterOperator::Gte => self.gte(field, value),
            FilterOperator::Lt => self.lt(field, value),
            FilterOperator::Lte => self.lte(field, value),
            FilterOperator::Between => self.between(field, value),
            FilterOperator::In => self.is_in(field, value),
            FilterOperator::NotIn => self.not_in(field, value),
        }
    }
}

fn unsupported<T>(op: FilterOperator) -> OpResult<T> {
    Err(OperatorError::Unsupported(op))
}

/// Decode the JSON list literal taken by `between`, `in` and `notin`.
///
/// # Errors
///
/// Returns [`OperatorError::InvalidValue`] if `value` is not a JSON array,
/// or for `between` if it does not hold exactly two elements.
pub fn parse_list(op: FilterOperator, value: &str) -> OpResult<Vec<serde_json::Value>> {
    let list: Vec<serde_json::Value> =
        serde_json::from_str(value).map_err(|e| OperatorError::InvalidValue {
            op,
            reason: format!("expected a JSON array: {e}"),
        })?;
    if op == FilterOperator::Between && list.len() != 2 {
        return Err(OperatorError::InvalidValue {
            op,
            reason: format!("expected exactly two bounds, got {}", list.len()),
        });
    }
    Ok(list)
}

/// Decode the boolean literal taken by `exists`.
///
/// # Errors
///
/// Returns [`OperatorError::InvalidValue`] for anything but `true`/`false`.
pub fn parse_exists(value: &str) -> OpResult<bool> {
    value.parse().map_err(|_| OperatorError::InvalidValue {
        op: FilterOperator::Exists,
        reason: format!("expected true or false, got {value:?}"),
    })
}

/// Render a JSON value as a filter literal (strings unquoted).
#[must_use]
pub fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

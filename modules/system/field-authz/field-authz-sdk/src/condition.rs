//! Backend-neutral condition tree.
//!
//! A [`Condition`] is a leaf predicate or a binary AND/OR over two sub-trees.
//! Query-building compilers emit it, backends translate it, and any
//! [`OperatorTable`] can re-evaluate it via [`Condition::evaluate`].

use serde::{Deserialize, Serialize};

use crate::operators::{Combine, FilterOperator, OperatorError, OperatorTable, parse_exists, parse_list};

/// Leaf predicate: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOperator,
    pub value: String,
}

/// Compiled filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Leaf(Predicate),
    And {
        left: Box<Condition>,
        right: Box<Condition>,
    },
    Or {
        left: Box<Condition>,
        right: Box<Condition>,
    },
}

impl Combine for Condition {
    fn and(self, other: Self) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    fn or(self, other: Self) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

impl Condition {
    pub fn leaf(field: impl Into<String>, op: FilterOperator, value: impl Into<String>) -> Self {
        Self::Leaf(Predicate {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    /// Evaluate the tree through `table`, leaf by leaf.
    ///
    /// # Errors
    ///
    /// Returns the first operator failure encountered.
    pub fn evaluate<T>(&self, table: &T) -> Result<T::Output, OperatorError>
    where
        T: OperatorTable + ?Sized,
    {
        match self {
            Self::Leaf(p) => table.apply(p.op, &p.field, &p.value),
            Self::And { left, right } => Ok(left.evaluate(table)?.and(right.evaluate(table)?)),
            Self::Or { left, right } => Ok(left.evaluate(table)?.or(right.evaluate(table)?)),
        }
    }

    /// All leaves, left to right.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Self::Leaf(p) => out.push(p),
            Self::And { left, right } | Self::Or { left, right } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }
}

/// Query-building operator table that emits [`Condition`] leaves.
///
/// Backends translate the resulting tree into their own predicate language;
/// they restrict the accepted operators with [`LeafBuilder::only`].
#[derive(Debug, Clone)]
pub struct LeafBuilder {
    supported: Vec<FilterOperator>,
}

impl Default for LeafBuilder {
    fn default() -> Self {
        Self::all()
    }
}

impl LeafBuilder {
    /// Accept every magic operator.
    #[must_use]
    pub fn all() -> Self {
        Self {
            supported: FilterOperator::ALL.to_vec(),
        }
    }

    /// Accept only `ops`.
    #[must_use]
    pub fn only(ops: &[FilterOperator]) -> Self {
        Self {
            supported: ops.to_vec(),
        }
    }

    #[must_use]
    pub fn supports(&self, op: FilterOperator) -> bool {
        self.supported.contains(&op)
    }

    fn leaf(&self, op: FilterOperator, field: &str, value: &str) -> Result<Condition, OperatorError> {
        if !self.supports(op) {
            return Err(OperatorError::Unsupported(op));
        }
        if op.takes_list() {
            parse_list(op, value)?;
        } else if op == FilterOperator::Exists {
            parse_exists(value)?;
        }
        Ok(Condition::leaf(field, op, value))
    }
}

impl OperatorTable for LeafBuilder {
    type Output = Condition;

    fn eq(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Eq, field, value)
    }

    fn ne(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Ne, field, value)
    }

    fn starts_with(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::StartsWith, field, value)
    }

    fn contains(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Contains, field, value)
    }

    fn not_contains(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::NotContains, field, value)
    }

    fn exists(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Exists, field, value)
    }

    fn gt(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Gt, field, value)
    }

    fn gte(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Gte, field, value)
    }

    fn lt(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Lt, field, value)
    }

    fn lte(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Lte, field, value)
    }

    fn between(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::Between, field, value)
    }

    fn is_in(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::In, field, value)
    }

    fn not_in(&self, field: &str, value: &str) -> Result<Condition, OperatorError> {
        self.leaf(FilterOperator::NotIn, field, value)
    }
}

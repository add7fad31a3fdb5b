#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Field `AuthZ` SDK
//!
//! This crate provides the public contract of the `field_authz` module:
//!
//! - [`Identity`], [`Group`], [`PermissionBundle`] - Identity and permission models
//! - [`FilterField`], [`FilterOperator`] - Row-level filter grants and magic operators
//! - [`Condition`] - Backend-neutral condition tree
//! - [`OperatorTable`] - Per-backend operator dispatch, with the two reference
//!   tables [`LeafBuilder`] (query building) and [`RecordEvaluator`] (in-memory)
//! - [`AuditEntry`], [`HistoryRevision`] - Audit trail models
//! - [`FieldValidator`] - Per-field business rule contract
//! - [`AuthorityClient`], [`RecordStore`], [`AuditSink`] - Collaborator contracts
//! - [`FieldAuthzError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use field_authz_sdk::{FilterOperator, LeafBuilder, OperatorTable, RecordEvaluator};
//!
//! // A store declares the operators it can translate...
//! let operators = LeafBuilder::only(&[FilterOperator::Eq, FilterOperator::In]);
//! let tree = operators.apply(FilterOperator::Eq, "owner", "u1")?;
//!
//! // ...and the same tree can be judged against a literal record.
//! let visible = tree.evaluate(&RecordEvaluator::new(&record))?;
//! ```

pub mod api;
pub mod audit;
pub mod condition;
pub mod error;
pub mod local;
pub mod models;
pub mod operators;
pub mod validation;

// Re-export main types at crate root
pub use api::{AuditSink, AuthorityClient, QueryOperators, RecordStore};
pub use audit::{AuditAction, AuditActor, AuditEntry, HistoryRevision, ResourceKey};
pub use condition::{Condition, LeafBuilder, Predicate};
pub use error::{ErrorKind, FieldAuthzError};
pub use local::RecordEvaluator;
pub use models::{
    AccessRequest, BundleBuilder, Endpoint, FilterAction, FilterField, Group, Identity,
    ObservedIdentity, PermissionBundle, QueryFilters, Record,
};
pub use operators::{Combine, FilterOperator, OperatorError, OperatorTable, parse_magic_key};
pub use validation::{FieldInput, FieldValidator, FieldVerdict, validator_fn};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Field `AuthZ` engine.
//!
//! Sits in front of a keyed record store and enforces per-user, per-field and
//! per-record authorization before any read, write or delete reaches it:
//!
//! - [`IdentityResolver`] - external ID + observed attributes → merged identity
//! - [`RequestGate`] - endpoint authorization state machine
//! - [`Filtering`] - permission + query filters → condition tree
//! - [`LocalFiltering`] - the same filters judged against a literal record
//! - [`validate_fields`] - concurrent per-field business rules
//! - [`replay`] - point-in-time history from the audit trail
//! - [`FieldAuthzService`] - all of the above composed over the collaborators
//!
//! ## Usage
//!
//! ```ignore
//! use field_authz::{FieldAuthzConfig, FieldAuthzService};
//!
//! let service = FieldAuthzService::new(authority, store, Some(audit), FieldAuthzConfig::default());
//!
//! let records = service.list(&request).await?;
//! let created = service.create(&request, "id", item, &rules).await?;
//! let history = service.history(&request, &ResourceKey::new("id", "42")).await?;
//! ```

pub mod config;
pub mod domain;

pub use config::FieldAuthzConfig;
pub use domain::fields::{authorize_update_fields, reject_excluded_fields, strip_excluded};
pub use domain::filtering::Filtering;
pub use domain::gate::{RequestGate, endpoint_allowed};
pub use domain::history::replay;
pub use domain::local::LocalFiltering;
pub use domain::resolver::IdentityResolver;
pub use domain::service::FieldAuthzService;
pub use domain::validator::{ValidationRules, validate_fields};

#[cfg(test)]
mod test_support;

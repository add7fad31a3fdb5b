#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static authority plugin.
//!
//! Serves the authority table (identities, entitlements and groups) from
//! configuration. Intended for development, tests and small fixed deployments.

pub mod config;
pub mod domain;

pub use config::StaticAuthorityPluginConfig;
pub use domain::service::Service;

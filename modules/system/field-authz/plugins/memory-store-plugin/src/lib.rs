#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! In-memory record store and audit sink.
//!
//! The store executes condition trees by re-evaluating them against each
//! stored record with the SDK's record evaluator, so it accepts exactly the
//! trees the engine compiles for it.

pub mod config;
pub mod domain;

pub use config::MemoryStorePluginConfig;
pub use domain::audit::InMemoryAuditSink;
pub use domain::store::InMemoryRecordStore;

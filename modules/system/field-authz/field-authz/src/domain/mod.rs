//! Domain layer - authorization resolution and filter compilation.
//!
//! ## Request flow
//!
//! Every operation passes the [`RequestGate`](gate::RequestGate), which
//! resolves the caller through the [`IdentityResolver`](resolver::IdentityResolver)
//! and checks its endpoint grants. The caller's row filters for the matching
//! action are then compiled by [`Filtering`](filtering::Filtering) over the
//! store's operator table, or judged in place by
//! [`LocalFiltering`](local::LocalFiltering) when the record does not exist yet.
//!
//! ## Precedence
//!
//! Within one filter key (or one field of a permission bundle) values are
//! alternatives and are `ORed`; distinct keys are all mandatory and are `ANDed`.
//!
//! ## Concurrency
//!
//! The only fan-out is [`validate_fields`](validator::validate_fields); every
//! other step is sequential and stateless between calls.

pub mod fields;
pub mod filtering;
pub mod gate;
pub mod history;
pub mod local;
pub mod resolver;
pub mod service;
pub mod validator;

//! Configuration types for Warden.
//!
//! This crate provides the configuration types read from
//! `.warden/config.yaml`: rate limit windows per operation class, audit
//! buffering, and session lifetime.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

//! PingOne Core
//!
//! Host-facing contracts for the PingOne provider: tri-state attribute
//! values, schemas, diagnostics, operation contexts, descriptor traits and
//! the lifecycle engine that drives them.

pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod provider;
pub mod resource;
pub mod schema;

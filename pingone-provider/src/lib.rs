//! PingOne Provider
//!
//! Region and product tables, the call orchestrator, the value bridge, the
//! lookup protocol and every resource and data-source descriptor.

pub mod bridge;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod declarative;
pub mod error;
pub mod lookup;
pub mod orchestrator;
pub mod product;
pub mod provider;
pub mod region;
pub mod resources;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use config::{ConfigError, ProviderConfig};
pub use provider::{DEFAULT_OPERATION_TIMEOUT, Operation, PingOneProvider};

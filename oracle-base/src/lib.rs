//! This crate contains the shared framework of the oracle agents: settings
//! loading, tracing, the shared store, block range syncing and the
//! fixed-interval runner that drives every component.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Settings and configuration for the oracle agents
pub mod settings;

mod agent;
pub use agent::*;

mod runner;
pub use runner::*;

mod store;
pub use store::*;

mod sync;
pub use sync::*;

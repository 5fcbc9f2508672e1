//! Core primitives, types and collaborator traits shared by the oracle
//! agents: the cross-chain message wire format, typed-data signing, the
//! transaction and message documents kept in the shared store, and the
//! interfaces through which the agents talk to chains and to that store.

// Forbid unsafe code outside of tests
#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(missing_docs)]

pub use chain::*;
pub use error::*;
pub use traits::*;
pub use types::*;

pub use ethers_core::types::{Bytes, H160, H256, U256};

/// Traits for canonical binary representations
pub mod encode;
pub use encode::{Decode, Encode};

/// Hex, address and bech32 helpers
pub mod utils;

/// Testing utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod chain;
mod error;
mod traits;
mod types;

/// Protocol version stamped into every message this oracle accepts.
pub const HYPERLANE_VERSION: u8 = 0;

/// Maximum number of blocks requested in a single log query.
pub const MAX_QUERY_BLOCKS: u64 = 100_000;

//! This crate contains mocks for testing the oracle agents.

#![forbid(unsafe_code)]
#![cfg_attr(test, warn(missing_docs))]

/// Mock chain clients and contracts
pub mod mocks;

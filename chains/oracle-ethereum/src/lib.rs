//! Interfaces to the ethereum contracts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use self::{contracts::*, provider::*};

mod contracts;

/// Ethers JSON-RPC client
mod provider;

/// Conversions between ethers log types and the oracle's own
mod logs;

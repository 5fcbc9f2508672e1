//! Implementation of the oracle's Cosmos collaborators: a tendermint RPC
//! client and the rules that decide whether a deposit into the bridge
//! multisig is genuine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use self::{error::*, events::*, provider::*, validate::*};

mod error;
mod events;
mod provider;
mod validate;

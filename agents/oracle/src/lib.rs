//! The oracle agent: watches mailboxes and the Cosmos bridge multisig for
//! cross-chain transfers, signs the messages it can verify against their
//! origin chain and closes them out once the destination fulfilled them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Deposit watching on the Cosmos multisig
pub mod cosmos_monitor;
/// Origin-side dispatch watching
pub mod monitor;
/// Agent bootstrap and runner wiring
pub mod oracle;
/// Destination-side fulfillment watching
pub mod relayer;
pub mod settings;
pub mod signer;
/// Transaction validation shared by the monitor and relayer
pub mod tx;

pub use oracle::Oracle;

#[cfg(test)]
mod test_utils;

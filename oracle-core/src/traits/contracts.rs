use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{
    ChainResult, DispatchEvent, DispatchIdEvent, DomainData, EthereumLog, EventStream,
    FulfillmentEvent, H160, U256,
};

/// Mailbox that dispatches outbound messages.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait MailboxContract: Send + Sync + Debug {
    /// Deployed address
    fn address(&self) -> H160;

    /// `Dispatch` events in `[from_block, to_block]` (inclusive) whose
    /// indexed sender is one of `senders`.
    async fn filter_dispatch(
        &self,
        from_block: u64,
        to_block: u64,
        senders: Vec<H160>,
    ) -> ChainResult<EventStream<'static, DispatchEvent>>;

    /// Decode a receipt log as `Dispatch`.
    fn parse_dispatch(&self, log: &EthereumLog) -> ChainResult<DispatchEvent>;

    /// Decode a receipt log as `DispatchId`.
    fn parse_dispatch_id(&self, log: &EthereumLog) -> ChainResult<DispatchIdEvent>;
}

/// Contract that mints or releases funds for verified messages.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait MintControllerContract: Send + Sync + Debug {
    /// Deployed address
    fn address(&self) -> H160;

    /// `Fulfillment` events in `[from_block, to_block]` (inclusive).
    async fn filter_fulfillment(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<EventStream<'static, FulfillmentEvent>>;

    /// Decode a receipt log as `Fulfillment`.
    fn parse_fulfillment(&self, log: &EthereumLog) -> ChainResult<FulfillmentEvent>;

    /// Largest amount a single message may mint
    async fn max_mint_limit(&self) -> ChainResult<U256>;
}

/// Interchain security module verifying validator signatures.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait WarpIsmContract: Send + Sync + Debug {
    /// Deployed address
    fn address(&self) -> H160;

    /// Number of registered validators
    async fn validator_count(&self) -> ChainResult<U256>;

    /// Signatures required to accept a message
    async fn signer_threshold(&self) -> ChainResult<U256>;

    /// EIP-712 domain signatures must be made under
    async fn eip712_domain(&self) -> ChainResult<DomainData>;
}

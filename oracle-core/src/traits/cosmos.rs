use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{Chain, ChainResult, CosmosTxResponse, H256};

/// Interface to a Cosmos SDK chain node.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait CosmosClient: Send + Sync + Debug {
    /// The chain this client talks to
    fn chain(&self) -> Chain;

    /// Blocks required on top of a transaction before it counts as final
    fn confirmations(&self) -> u64;

    /// Latest block height
    async fn get_block_height(&self) -> ChainResult<u64>;

    /// Look up a delivered transaction by hash
    async fn get_tx(&self, hash: H256) -> ChainResult<CosmosTxResponse>;

    /// Every delivered transaction that transferred coins to `address` at
    /// or above `height`, oldest first
    async fn get_txs_sent_to_address_after_height(
        &self,
        address: &str,
        height: u64,
    ) -> ChainResult<Vec<CosmosTxResponse>>;
}

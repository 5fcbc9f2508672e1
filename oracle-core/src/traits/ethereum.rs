use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{Bytes, Chain, ChainResult, H160, H256, U256};

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EthereumTransaction {
    /// Transaction hash
    pub hash: H256,
    /// Sender
    pub from: H160,
    /// Recipient, `None` for contract creation
    pub to: Option<H160>,
    /// Including block, `None` while pending
    pub block_number: Option<u64>,
}

/// A raw log inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EthereumLog {
    /// Emitting contract
    pub address: H160,
    /// Indexed topics, event signature first
    pub topics: Vec<H256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Dropped by a reorg
    pub removed: bool,
}

/// A transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EthereumReceipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Including block
    pub block_number: u64,
    /// `status == 1`
    pub success: bool,
    /// Logs in emission order
    pub logs: Vec<EthereumLog>,
}

impl EthereumReceipt {
    /// Logs emitted by `address`.
    pub fn logs_at(&self, address: H160) -> impl Iterator<Item = &EthereumLog> {
        self.logs.iter().filter(move |log| log.address == address)
    }
}

/// Interface to an EVM chain node. One instance per configured chain.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait EthereumClient: Send + Sync + Debug {
    /// The chain this client talks to
    fn chain(&self) -> Chain;

    /// Blocks required on top of a transaction before it counts as final
    fn confirmations(&self) -> u64;

    /// Latest block number
    async fn get_block_height(&self) -> ChainResult<u64>;

    /// Chain id reported by the node
    async fn get_chain_id(&self) -> ChainResult<U256>;

    /// Look up a transaction. `Ok(None)` when the node does not know it.
    async fn get_transaction_by_hash(&self, hash: H256) -> ChainResult<Option<EthereumTransaction>>;

    /// Look up a receipt. `Ok(None)` when the transaction is not mined.
    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<EthereumReceipt>>;
}

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::prelude::{Http, Middleware, Provider};
use tracing::instrument;
use url::Url;

use oracle_core::{
    Chain, ChainCommunicationError, ChainResult, EthereumClient, EthereumReceipt,
    EthereumTransaction, H256, U256,
};

use crate::logs::to_ethereum_log;

/// An HTTP JSON-RPC provider whose requests give up after `timeout`.
pub fn build_http_provider(url: &Url, timeout: Duration) -> ChainResult<Arc<Provider<Http>>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ChainCommunicationError::from_other)?;
    Ok(Arc::new(Provider::new(Http::new_with_client(
        url.clone(),
        client,
    ))))
}

/// Ethereum node client over an ethers middleware
pub struct EthereumProvider<M> {
    chain: Chain,
    provider: Arc<M>,
    confirmations: u64,
}

impl<M> EthereumProvider<M> {
    /// Wrap `provider` for `chain`.
    pub fn new(chain: Chain, provider: Arc<M>, confirmations: u64) -> Self {
        Self {
            chain,
            provider,
            confirmations,
        }
    }
}

impl<M> Debug for EthereumProvider<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthereumProvider {{ chain: {} }}", self.chain)
    }
}

#[async_trait]
impl<M> EthereumClient for EthereumProvider<M>
where
    M: Middleware + 'static,
{
    fn chain(&self) -> Chain {
        self.chain.clone()
    }

    fn confirmations(&self) -> u64 {
        self.confirmations
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_block_height(&self) -> ChainResult<u64> {
        let height = self
            .provider
            .get_block_number()
            .await
            .map_err(ChainCommunicationError::from_other)?;
        Ok(height.as_u64())
    }

    async fn get_chain_id(&self) -> ChainResult<U256> {
        self.provider
            .get_chainid()
            .await
            .map_err(ChainCommunicationError::from_other)
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_transaction_by_hash(&self, hash: H256) -> ChainResult<Option<EthereumTransaction>> {
        let tx = self
            .provider
            .get_transaction(hash)
            .await
            .map_err(ChainCommunicationError::from_other)?;
        Ok(tx.map(|tx| EthereumTransaction {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            block_number: tx.block_number.map(|n| n.as_u64()),
        }))
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<EthereumReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(ChainCommunicationError::from_other)?;
        // a receipt without a block is not final yet
        Ok(receipt.and_then(|receipt| {
            let block_number = receipt.block_number?.as_u64();
            Some(EthereumReceipt {
                transaction_hash: receipt.transaction_hash,
                block_number,
                success: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
                logs: receipt.logs.into_iter().map(to_ethereum_log).collect(),
            })
        }))
    }
}

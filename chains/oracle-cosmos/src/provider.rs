use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cosmrs::Tx;
use tendermint::abci::Event;
use tendermint::hash::Algorithm;
use tendermint::Hash;
use tendermint_rpc::endpoint::tx;
use tendermint_rpc::query::Query;
use tendermint_rpc::{client::CompatMode, Client, HttpClient, HttpClientUrl, Order};
use tracing::{debug, instrument, warn};
use url::Url;

use oracle_core::{Chain, ChainResult, CosmosClient, CosmosEvent, CosmosTxResponse, H256};

use crate::CosmosError;

const TX_SEARCH_PAGE_SIZE: u8 = 50;

/// Tendermint RPC client for one Cosmos chain
#[derive(Clone)]
pub struct CosmosProvider {
    chain: Chain,
    rpc_client: HttpClient,
    timeout: Duration,
    confirmations: u64,
}

impl CosmosProvider {
    /// Connect to the node at `url`. Every request is abandoned after
    /// `timeout`.
    pub fn new(
        chain: Chain,
        url: &Url,
        timeout: Duration,
        confirmations: u64,
    ) -> ChainResult<Self> {
        let url: HttpClientUrl = url.as_str().parse().map_err(CosmosError::from)?;
        let rpc_client = HttpClient::builder(url)
            .compat_mode(CompatMode::latest())
            .build()
            .map_err(CosmosError::from)?;
        Ok(Self {
            chain,
            rpc_client,
            timeout,
            confirmations,
        })
    }

    async fn with_timeout<T, F>(&self, request: F) -> ChainResult<T>
    where
        F: Future<Output = Result<T, tendermint_rpc::Error>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => Ok(result.map_err(CosmosError::from)?),
            Err(_) => Err(CosmosError::Timeout(self.timeout).into()),
        }
    }
}

impl Debug for CosmosProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CosmosProvider {{ chain: {} }}", self.chain)
    }
}

fn to_cosmos_event(event: Event) -> CosmosEvent {
    let attributes = event
        .attributes
        .iter()
        .filter_map(|attribute| {
            let key = attribute.key_str().ok()?;
            let value = attribute.value_str().ok()?;
            Some((key.to_owned(), value.to_owned()))
        })
        .collect();
    CosmosEvent {
        kind: event.kind,
        attributes,
    }
}

#[async_trait]
impl CosmosClient for CosmosProvider {
    fn chain(&self) -> Chain {
        self.chain.clone()
    }

    fn confirmations(&self) -> u64 {
        self.confirmations
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_block_height(&self) -> ChainResult<u64> {
        let response = self.with_timeout(self.rpc_client.latest_block()).await?;
        Ok(response.block.header.height.value())
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_tx(&self, hash: H256) -> ChainResult<CosmosTxResponse> {
        let tendermint_hash =
            Hash::from_bytes(Algorithm::Sha256, hash.as_bytes()).map_err(CosmosError::from)?;
        let response = self
            .with_timeout(self.rpc_client.tx(tendermint_hash, false))
            .await?;
        Ok(to_cosmos_tx(hash, response))
    }

    #[instrument(level = "debug", err, skip(self), fields(chain = %self.chain))]
    async fn get_txs_sent_to_address_after_height(
        &self,
        address: &str,
        height: u64,
    ) -> ChainResult<Vec<CosmosTxResponse>> {
        let query = Query::eq("transfer.recipient", address).and_gte("tx.height", height);
        let mut txs = vec![];
        let mut page = 1;
        loop {
            let response = self
                .with_timeout(self.rpc_client.tx_search(
                    query.clone(),
                    false,
                    page,
                    TX_SEARCH_PAGE_SIZE,
                    Order::Ascending,
                ))
                .await?;
            let received = response.txs.len();
            for tx in response.txs {
                if tx.hash.as_bytes().len() != H256::len_bytes() {
                    warn!(hash = %tx.hash, "Skipping tx without a sha256 hash");
                    continue;
                }
                txs.push(to_cosmos_tx(H256::from_slice(tx.hash.as_bytes()), tx));
            }
            let seen = (page as usize - 1) * TX_SEARCH_PAGE_SIZE as usize + received;
            if received == 0 || seen >= response.total_count as usize {
                break;
            }
            page += 1;
        }
        debug!(address, height, found = txs.len(), "Searched txs sent to address");
        Ok(txs)
    }
}

fn to_cosmos_tx(hash: H256, response: tx::Response) -> CosmosTxResponse {
    let memo = match Tx::from_bytes(&response.tx) {
        Ok(tx) => Some(tx.body.memo),
        Err(err) => {
            warn!(?hash, ?err, "Unable to decode tx body");
            None
        }
    };

    CosmosTxResponse {
        hash,
        height: response.height.value(),
        code: response.tx_result.code.value(),
        events: response
            .tx_result
            .events
            .into_iter()
            .map(to_cosmos_event)
            .collect(),
        memo,
    }
}

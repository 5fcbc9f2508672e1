#![allow(missing_docs)]

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::{abigen, Middleware};
use tracing::instrument;

use oracle_core::{
    ChainResult, EthereumLog, EventStream, FulfillmentEvent, MintControllerContract, H160, H256,
    U256,
};

use crate::logs::{decode_log, fetch_events};

abigen!(
    MintControllerInternal,
    r#"[
        event Fulfillment(bytes32 indexed orderId, bytes message)
        function maxMintLimit() external view returns (uint256)
    ]"#
);

impl From<FulfillmentFilter> for FulfillmentEvent {
    fn from(event: FulfillmentFilter) -> Self {
        FulfillmentEvent {
            order_id: H256::from(event.order_id),
            message: event.message,
        }
    }
}

/// A reference to a MintController contract on some Ethereum chain
pub struct EthereumMintController<M>
where
    M: Middleware,
{
    contract: Arc<MintControllerInternal<M>>,
    provider: Arc<M>,
}

impl<M> EthereumMintController<M>
where
    M: Middleware + 'static,
{
    /// Create a reference to a mint controller at a specific Ethereum address
    pub fn new(provider: Arc<M>, address: H160) -> Self {
        Self {
            contract: Arc::new(MintControllerInternal::new(address, provider.clone())),
            provider,
        }
    }
}

impl<M: Middleware> Debug for EthereumMintController<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EthereumMintController {{ address: {:?} }}",
            self.contract.address()
        )
    }
}

#[async_trait]
impl<M> MintControllerContract for EthereumMintController<M>
where
    M: Middleware + 'static,
{
    fn address(&self) -> H160 {
        self.contract.address()
    }

    async fn filter_fulfillment(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<EventStream<'static, FulfillmentEvent>> {
        let event = self
            .contract
            .fulfillment_filter()
            .from_block(from_block)
            .to_block(to_block);
        fetch_events::<M, FulfillmentFilter, _, _>(&self.provider, &event.filter, FulfillmentEvent::from)
            .await
    }

    fn parse_fulfillment(&self, log: &EthereumLog) -> ChainResult<FulfillmentEvent> {
        decode_log::<FulfillmentFilter>(log).map(Into::into)
    }

    #[instrument(err, skip(self))]
    async fn max_mint_limit(&self) -> ChainResult<U256> {
        Ok(self.contract.max_mint_limit().call().await?)
    }
}

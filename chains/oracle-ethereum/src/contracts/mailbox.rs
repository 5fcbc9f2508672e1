#![allow(missing_docs)]

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::{abigen, Middleware};
use ethers::types::{Topic, ValueOrArray};

use oracle_core::{
    ChainResult, DispatchEvent, DispatchIdEvent, EthereumLog, EventStream, MailboxContract, H160,
    H256,
};

use crate::logs::{decode_log, fetch_events};

abigen!(
    MailboxInternal,
    r#"[
        event Dispatch(address indexed sender, uint32 indexed destination, bytes32 indexed recipient, bytes message)
        event DispatchId(bytes32 indexed messageId)
    ]"#
);

impl From<DispatchFilter> for DispatchEvent {
    fn from(event: DispatchFilter) -> Self {
        DispatchEvent {
            sender: event.sender,
            destination: event.destination,
            recipient: H256::from(event.recipient),
            message: event.message,
        }
    }
}

impl From<DispatchIdFilter> for DispatchIdEvent {
    fn from(event: DispatchIdFilter) -> Self {
        DispatchIdEvent {
            message_id: H256::from(event.message_id),
        }
    }
}

/// A reference to a Mailbox contract on some Ethereum chain
pub struct EthereumMailbox<M>
where
    M: Middleware,
{
    contract: Arc<MailboxInternal<M>>,
    provider: Arc<M>,
}

impl<M> EthereumMailbox<M>
where
    M: Middleware + 'static,
{
    /// Create a reference to a mailbox at a specific Ethereum address
    pub fn new(provider: Arc<M>, address: H160) -> Self {
        Self {
            contract: Arc::new(MailboxInternal::new(address, provider.clone())),
            provider,
        }
    }
}

impl<M: Middleware> Debug for EthereumMailbox<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthereumMailbox {{ address: {:?} }}", self.contract.address())
    }
}

#[async_trait]
impl<M> MailboxContract for EthereumMailbox<M>
where
    M: Middleware + 'static,
{
    fn address(&self) -> H160 {
        self.contract.address()
    }

    async fn filter_dispatch(
        &self,
        from_block: u64,
        to_block: u64,
        senders: Vec<H160>,
    ) -> ChainResult<EventStream<'static, DispatchEvent>> {
        let sender_topic: Topic =
            ValueOrArray::Array(senders.into_iter().map(|s| Some(H256::from(s))).collect());
        let event = self
            .contract
            .dispatch_filter()
            .from_block(from_block)
            .to_block(to_block)
            .topic1(sender_topic);
        fetch_events::<M, DispatchFilter, _, _>(&self.provider, &event.filter, DispatchEvent::from)
            .await
    }

    fn parse_dispatch(&self, log: &EthereumLog) -> ChainResult<DispatchEvent> {
        decode_log::<DispatchFilter>(log).map(Into::into)
    }

    fn parse_dispatch_id(&self, log: &EthereumLog) -> ChainResult<DispatchIdEvent> {
        decode_log::<DispatchIdFilter>(log).map(Into::into)
    }
}

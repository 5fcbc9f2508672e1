#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use oracle_core::*;

use super::event_stream;

mock! {
    pub MailboxContract {
        pub fn _address(&self) -> H160 {}

        pub fn _filter_dispatch(
            &self,
            from_block: u64,
            to_block: u64,
            senders: Vec<H160>,
        ) -> ChainResult<Vec<ChainResult<(DispatchEvent, LogMeta)>>> {}

        pub fn _parse_dispatch(&self, log: &EthereumLog) -> ChainResult<DispatchEvent> {}

        pub fn _parse_dispatch_id(&self, log: &EthereumLog) -> ChainResult<DispatchIdEvent> {}
    }
}

impl std::fmt::Debug for MockMailboxContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockMailboxContract")
    }
}

#[async_trait]
impl MailboxContract for MockMailboxContract {
    fn address(&self) -> H160 {
        self._address()
    }

    async fn filter_dispatch(
        &self,
        from_block: u64,
        to_block: u64,
        senders: Vec<H160>,
    ) -> ChainResult<EventStream<'static, DispatchEvent>> {
        self._filter_dispatch(from_block, to_block, senders)
            .map(event_stream)
    }

    fn parse_dispatch(&self, log: &EthereumLog) -> ChainResult<DispatchEvent> {
        self._parse_dispatch(log)
    }

    fn parse_dispatch_id(&self, log: &EthereumLog) -> ChainResult<DispatchIdEvent> {
        self._parse_dispatch_id(log)
    }
}

mock! {
    pub MintControllerContract {
        pub fn _address(&self) -> H160 {}

        pub fn _filter_fulfillment(
            &self,
            from_block: u64,
            to_block: u64,
        ) -> ChainResult<Vec<ChainResult<(FulfillmentEvent, LogMeta)>>> {}

        pub fn _parse_fulfillment(&self, log: &EthereumLog) -> ChainResult<FulfillmentEvent> {}

        pub fn _max_mint_limit(&self) -> ChainResult<U256> {}
    }
}

impl std::fmt::Debug for MockMintControllerContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockMintControllerContract")
    }
}

#[async_trait]
impl MintControllerContract for MockMintControllerContract {
    fn address(&self) -> H160 {
        self._address()
    }

    async fn filter_fulfillment(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> ChainResult<EventStream<'static, FulfillmentEvent>> {
        self._filter_fulfillment(from_block, to_block)
            .map(event_stream)
    }

    fn parse_fulfillment(&self, log: &EthereumLog) -> ChainResult<FulfillmentEvent> {
        self._parse_fulfillment(log)
    }

    async fn max_mint_limit(&self) -> ChainResult<U256> {
        self._max_mint_limit()
    }
}

mock! {
    pub WarpIsmContract {
        pub fn _address(&self) -> H160 {}

        pub fn _validator_count(&self) -> ChainResult<U256> {}

        pub fn _signer_threshold(&self) -> ChainResult<U256> {}

        pub fn _eip712_domain(&self) -> ChainResult<DomainData> {}
    }
}

impl std::fmt::Debug for MockWarpIsmContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockWarpIsmContract")
    }
}

#[async_trait]
impl WarpIsmContract for MockWarpIsmContract {
    fn address(&self) -> H160 {
        self._address()
    }

    async fn validator_count(&self) -> ChainResult<U256> {
        self._validator_count()
    }

    async fn signer_threshold(&self) -> ChainResult<U256> {
        self._signer_threshold()
    }

    async fn eip712_domain(&self) -> ChainResult<DomainData> {
        self._eip712_domain()
    }
}

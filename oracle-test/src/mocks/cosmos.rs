#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use oracle_core::*;

mock! {
    pub CosmosClient {
        pub fn _chain(&self) -> Chain {}

        pub fn _confirmations(&self) -> u64 {}

        pub fn _get_block_height(&self) -> ChainResult<u64> {}

        pub fn _get_tx(&self, hash: H256) -> ChainResult<CosmosTxResponse> {}

        pub fn _get_txs_sent_to_address_after_height(
            &self,
            address: String,
            height: u64,
        ) -> ChainResult<Vec<CosmosTxResponse>> {}
    }
}

impl std::fmt::Debug for MockCosmosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockCosmosClient")
    }
}

#[async_trait]
impl CosmosClient for MockCosmosClient {
    fn chain(&self) -> Chain {
        self._chain()
    }

    fn confirmations(&self) -> u64 {
        self._confirmations()
    }

    async fn get_block_height(&self) -> ChainResult<u64> {
        self._get_block_height()
    }

    async fn get_tx(&self, hash: H256) -> ChainResult<CosmosTxResponse> {
        self._get_tx(hash)
    }

    async fn get_txs_sent_to_address_after_height(
        &self,
        address: &str,
        height: u64,
    ) -> ChainResult<Vec<CosmosTxResponse>> {
        self._get_txs_sent_to_address_after_height(address.to_owned(), height)
    }
}

#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use oracle_core::*;

mock! {
    pub EthereumClient {
        pub fn _chain(&self) -> Chain {}

        pub fn _confirmations(&self) -> u64 {}

        pub fn _get_block_height(&self) -> ChainResult<u64> {}

        pub fn _get_chain_id(&self) -> ChainResult<U256> {}

        pub fn _get_transaction_by_hash(
            &self,
            hash: H256,
        ) -> ChainResult<Option<EthereumTransaction>> {}

        pub fn _get_transaction_receipt(
            &self,
            hash: H256,
        ) -> ChainResult<Option<EthereumReceipt>> {}
    }
}

impl std::fmt::Debug for MockEthereumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockEthereumClient")
    }
}

#[async_trait]
impl EthereumClient for MockEthereumClient {
    fn chain(&self) -> Chain {
        self._chain()
    }

    fn confirmations(&self) -> u64 {
        self._confirmations()
    }

    async fn get_block_height(&self) -> ChainResult<u64> {
        self._get_block_height()
    }

    async fn get_chain_id(&self) -> ChainResult<U256> {
        self._get_chain_id()
    }

    async fn get_transaction_by_hash(&self, hash: H256) -> ChainResult<Option<EthereumTransaction>> {
        self._get_transaction_by_hash(hash)
    }

    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<EthereumReceipt>> {
        self._get_transaction_receipt(hash)
    }
}

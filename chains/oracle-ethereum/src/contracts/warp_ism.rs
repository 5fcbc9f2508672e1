#![allow(missing_docs)]

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::{abigen, Middleware};
use tracing::instrument;

use oracle_core::{ChainCommunicationError, ChainResult, DomainData, WarpIsmContract, H160, H256, U256};

abigen!(
    WarpIsmInternal,
    r#"[
        function validatorCount() external view returns (uint256)
        function signerThreshold() external view returns (uint256)
        function eip712Domain() external view returns (bytes1 fields, string name, string version, uint256 chainId, address verifyingContract, bytes32 salt, uint256[] extensions)
    ]"#
);

type Eip712DomainReturn = ([u8; 1], String, String, U256, H160, [u8; 32], Vec<U256>);

/// A reference to a WarpISM contract on some Ethereum chain
pub struct EthereumWarpIsm<M>
where
    M: Middleware,
{
    contract: Arc<WarpIsmInternal<M>>,
}

impl<M> EthereumWarpIsm<M>
where
    M: Middleware + 'static,
{
    /// Create a reference to a WarpISM at a specific Ethereum address
    pub fn new(provider: Arc<M>, address: H160) -> Self {
        Self {
            contract: Arc::new(WarpIsmInternal::new(address, provider)),
        }
    }
}

impl<M: Middleware> Debug for EthereumWarpIsm<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthereumWarpIsm {{ address: {:?} }}", self.contract.address())
    }
}

#[async_trait]
impl<M> WarpIsmContract for EthereumWarpIsm<M>
where
    M: Middleware + 'static,
{
    fn address(&self) -> H160 {
        self.contract.address()
    }

    #[instrument(err, skip(self))]
    async fn validator_count(&self) -> ChainResult<U256> {
        Ok(self.contract.validator_count().call().await?)
    }

    #[instrument(err, skip(self))]
    async fn signer_threshold(&self) -> ChainResult<U256> {
        Ok(self.contract.signer_threshold().call().await?)
    }

    #[instrument(err, skip(self))]
    async fn eip712_domain(&self) -> ChainResult<DomainData> {
        let (_fields, name, version, chain_id, verifying_contract, salt, extensions) = self
            .contract
            .method::<_, Eip712DomainReturn>("eip712Domain", ())
            .map_err(ChainCommunicationError::from_contract_error)?
            .call()
            .await?;
        Ok(DomainData {
            name,
            version,
            chain_id,
            verifying_contract,
            salt: H256::from(salt),
            extensions,
        })
    }
}

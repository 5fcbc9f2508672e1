use oracle_core::ChainCommunicationError;

/// Errors from the Cosmos RPC stack
#[derive(Debug, thiserror::Error)]
pub enum CosmosError {
    /// Tendermint RPC error
    #[error(transparent)]
    RpcError(#[from] tendermint_rpc::Error),
    /// Tendermint type error
    #[error(transparent)]
    TendermintError(#[from] tendermint::Error),
    /// The node did not answer within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<CosmosError> for ChainCommunicationError {
    fn from(value: CosmosError) -> Self {
        ChainCommunicationError::from_other(value)
    }
}

/// Why a bank event could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinEventError {
    /// No `message` event carried a sender
    #[error("no sender found in message events")]
    MissingSender,
    /// An amount attribute was not `<integer><denom>`
    #[error("unable to parse coin amount {0:?}")]
    InvalidAmount(String),
    /// A coin of another denomination was moved
    #[error("invalid coin denom {0}")]
    InvalidDenom(String),
    /// Coins were spent by more than one account
    #[error("multiple spenders found in coin spent events")]
    MultipleSpenders,
    /// An amount attribute listed more than one coin
    #[error("multiple coins in amount {0:?}")]
    MultipleCoins(String),
}
